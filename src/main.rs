fn main() {
    poker_cfr::cli::run();
}
