//! Parsing of `perf stat -x,` output.
//!
//! Each counted event is one CSV line on stderr:
//!
//! ```text
//! 1234567,,cycles,1002003,100.00,,
//! <not supported>,,cache-misses,0,100.00,,
//! ```

use polytune_core::Metrics;
use regex::Regex;
use std::sync::OnceLock;

fn counter_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?P<value>[0-9]+(?:\.[0-9]+)?),(?P<unit>[^,]*),(?P<event>[^,]+)")
            .expect("counter line pattern is valid")
    })
}

/// Extract every counted event from profiler stderr.
///
/// Lines whose value is not numeric (`<not supported>`, `<not counted>`,
/// victim chatter) are skipped.
pub fn parse_perf_csv(stderr: &str) -> Metrics {
    let mut metrics = Metrics::new();
    for line in stderr.lines() {
        let Some(captures) = counter_line().captures(line) else {
            continue;
        };
        let (Some(value), Some(event)) = (captures.name("value"), captures.name("event")) else {
            continue;
        };
        if let Ok(value) = value.as_str().parse::<f64>() {
            metrics.insert(event.as_str().trim().to_string(), value);
        }
    }
    metrics
}

/// Last non-empty line of profiler output, used in diagnostics.
pub(crate) fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_counted_events() {
        let stderr = "1234567,,cycles,1002003,100.00,,\n45678,,cache-misses,1002003,100.00,,\n";
        let metrics = parse_perf_csv(stderr);
        assert_eq!(metrics.get("cycles"), Some(&1234567.0));
        assert_eq!(metrics.get("cache-misses"), Some(&45678.0));
    }

    #[test]
    fn test_parse_skips_unsupported_events() {
        let stderr = "1234567,,cycles,1002003,100.00,,\n<not supported>,,cache-misses,0,100.00,,\n";
        let metrics = parse_perf_csv(stderr);
        assert_eq!(metrics.len(), 1);
        assert!(!metrics.contains_key("cache-misses"));
    }

    #[test]
    fn test_parse_task_clock_with_unit() {
        let stderr = "stress-ng: info: dispatching hogs\n2003.52,msec,task-clock,2003520000,100.00,3.998,CPUs utilized\n";
        let metrics = parse_perf_csv(stderr);
        assert_eq!(metrics.get("task-clock"), Some(&2003.52));
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_perf_csv("").is_empty());
        assert_eq!(last_line("\n  \n"), "no output");
        assert_eq!(last_line("a\nperf: not found\n"), "perf: not found");
    }
}
