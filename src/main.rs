//! rosettabench CLI entry point

fn main() {
    rosettabench::cli::run();
}
