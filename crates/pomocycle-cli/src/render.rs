//! Terminal progress renderer.
//!
//! Redraws a single status line: one bar for the interval counting down and,
//! while a meso-group is running, a second bar for the whole group. Each bar
//! is followed by the remaining time as `MM:SS`.

use std::io::Write;
use std::time::Duration;

use pomocycle_core::timer::{StateReader, StatusReport};

const BAR_WIDTH: usize = 30;

/// Remaining seconds as `MM:SS`, rounded up so a running interval never
/// shows `00:00`.
pub fn format_time(secs: f64) -> String {
    let secs = secs.max(0.0).ceil() as u64;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn bar(elapsed: f64, total: f64, width: usize) -> String {
    let ratio = if total > 0.0 {
        (elapsed / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

pub fn render_frame(report: &StatusReport, width: usize) -> String {
    if report.current_total == 0.0 && !report.in_meso {
        return "waiting for first interval".to_string();
    }

    let mut frame = format!(
        "{} {}",
        bar(report.current_elapsed, report.current_total, width),
        format_time(report.current_remaining())
    );
    if report.in_meso {
        frame.push_str(&format!(
            "  group {} {}",
            bar(report.meso_elapsed, report.meso_total, width),
            format_time(report.meso_remaining())
        ));
    }
    frame
}

/// Redraw every `period` until the task is dropped.
pub async fn run(reader: StateReader, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    let mut stdout = std::io::stdout();
    loop {
        ticker.tick().await;
        let frame = render_frame(&reader.status(), BAR_WIDTH);
        let _ = write!(stdout, "\r{frame}\x1b[K");
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(
        current_total: f64,
        current_elapsed: f64,
        in_meso: bool,
        meso_total: f64,
        meso_elapsed: f64,
    ) -> StatusReport {
        StatusReport {
            current_total,
            current_elapsed,
            in_meso,
            meso_total,
            meso_elapsed,
            at: Default::default(),
        }
    }

    #[test]
    fn format_time_rounds_up() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(0.2), "00:01");
        assert_eq!(format_time(59.0), "00:59");
        assert_eq!(format_time(125.5), "02:06");
        assert_eq!(format_time(-3.0), "00:00");
    }

    #[test]
    fn bar_fills_proportionally() {
        assert_eq!(bar(0.0, 10.0, 4), "[----]");
        assert_eq!(bar(5.0, 10.0, 4), "[##--]");
        assert_eq!(bar(10.0, 10.0, 4), "[####]");
        assert_eq!(bar(3.0, 0.0, 4), "[----]");
    }

    #[test]
    fn idle_frame() {
        assert_eq!(
            render_frame(&report(0.0, 0.0, false, 0.0, 0.0), 4),
            "waiting for first interval"
        );
    }

    #[test]
    fn frame_shows_group_bar_only_inside_meso() {
        let rest = render_frame(&report(300.0, 60.0, false, 0.0, 0.0), 4);
        assert_eq!(rest, "[#---] 04:00");

        let work = render_frame(&report(20.0, 10.0, true, 100.0, 50.0), 4);
        assert_eq!(work, "[##--] 00:10  group [##--] 00:50");
    }
}
