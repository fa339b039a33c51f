pub mod actions;
pub mod cards;
pub mod cli;
pub mod display;
pub mod engine;
pub mod equity;
pub mod error;
pub mod hand_evaluator;
pub mod infoset;
pub mod strategy;
pub mod trainer;
pub mod traverse;
