fn main() {
    region_ifdef::cli::run();
}
