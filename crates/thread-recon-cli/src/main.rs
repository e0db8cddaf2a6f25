#![forbid(unsafe_code)]

fn main() {
    std::process::exit(thread_recon_cli::run());
}
