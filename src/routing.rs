use crate::domain::{Gateway, HealthSnapshot};

/// Extra latency the default gateway is allowed over the fallback before
/// traffic shifts, in milliseconds. Hysteresis against flapping on marginal
/// differences; the default charges a lower fee, so ties keep it.
pub const LATENCY_MARGIN_MS: u64 = 50;

/// Picks the gateway for one payment from the latest health snapshot pair.
///
/// Chooses the fallback iff the default is failing, or the default's
/// advertised minimum response time exceeds the fallback's by more than
/// [`LATENCY_MARGIN_MS`]. Everything else routes to the default.
/// Deterministic and side-effect-free.
pub fn route(default: &HealthSnapshot, fallback: &HealthSnapshot) -> Gateway {
    // Saturating difference: an unresponsive gateway can advertise
    // u64::MAX, which would wrap a plain `fallback + margin` sum.
    let excess = default
        .min_response_time
        .saturating_sub(fallback.min_response_time);
    if default.failing || excess > LATENCY_MARGIN_MS {
        return Gateway::Fallback;
    }
    Gateway::Default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_default_keeps_traffic() {
        let default = HealthSnapshot::new(false, 100);
        let fallback = HealthSnapshot::new(false, 100);
        assert_eq!(route(&default, &fallback), Gateway::Default);
    }

    #[test]
    fn failing_default_shifts_regardless_of_latency() {
        for (default_ms, fallback_ms) in [(0, 0), (1, 10_000), (10_000, 1)] {
            let default = HealthSnapshot::new(true, default_ms);
            let fallback = HealthSnapshot::new(false, fallback_ms);
            assert_eq!(route(&default, &fallback), Gateway::Fallback);
        }
    }

    #[test]
    fn failing_default_shifts_even_when_fallback_also_fails() {
        let default = HealthSnapshot::new(true, 100);
        let fallback = HealthSnapshot::new(true, 100);
        assert_eq!(route(&default, &fallback), Gateway::Fallback);
    }

    #[test]
    fn slow_default_shifts_once_past_the_margin() {
        let fallback = HealthSnapshot::new(false, 100);

        let just_inside = HealthSnapshot::new(false, 150);
        assert_eq!(route(&just_inside, &fallback), Gateway::Default);

        let just_past = HealthSnapshot::new(false, 151);
        assert_eq!(route(&just_past, &fallback), Gateway::Fallback);
    }

    #[test]
    fn margin_boundary_keeps_default() {
        // Equality at fallback + margin selects the cheaper default.
        let default = HealthSnapshot::new(false, 50);
        let fallback = HealthSnapshot::new(false, 0);
        assert_eq!(route(&default, &fallback), Gateway::Default);
    }

    #[test]
    fn sentinel_latencies_do_not_wrap_the_margin() {
        // An unresponsive gateway advertises u64::MAX; the comparison
        // saturates instead of wrapping past the margin.
        let sentinel = HealthSnapshot::new(false, u64::MAX);
        let healthy = HealthSnapshot::new(false, 100);

        assert_eq!(route(&healthy, &sentinel), Gateway::Default);
        assert_eq!(route(&sentinel, &healthy), Gateway::Fallback);
        assert_eq!(route(&sentinel, &sentinel), Gateway::Default);
    }

    #[test]
    fn unobserved_gateways_route_to_default() {
        // Before the first probe completes both snapshots are zero values.
        assert_eq!(
            route(&HealthSnapshot::default(), &HealthSnapshot::default()),
            Gateway::Default
        );
    }
}
