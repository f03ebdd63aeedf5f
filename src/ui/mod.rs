pub mod progress;

pub use progress::TrialProgress;

pub fn print_banner() {
    println!("uartecho-rs");
}
