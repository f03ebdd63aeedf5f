/// Simulation time in picoseconds.
pub type SimTime = u64;

pub const PS_PER_NS: SimTime = 1_000;
pub const PS_PER_SEC: SimTime = 1_000_000_000_000;

pub const fn ns(value: u64) -> SimTime {
    value * PS_PER_NS
}

/// Render a timestamp as nanoseconds with picosecond precision.
pub fn format_time(t: SimTime) -> String {
    format!("{}.{:03} ns", t / PS_PER_NS, t % PS_PER_NS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(ns(20)), "20.000 ns");
        assert_eq!(format_time(8_680_556), "8680.556 ns");
    }
}
