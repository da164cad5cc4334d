fn main() {
    trial_wrangler::cli::run();
}
