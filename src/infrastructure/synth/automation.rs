//! 参数自动化时间线
//!
//! 只有两种事件：立即设置（零长度段）和线性过渡

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: f64,
    end: f64,
    from: f32,
    to: f32,
}

impl Segment {
    fn value_at(&self, t: f64) -> f32 {
        if t >= self.end || self.end <= self.start {
            self.to
        } else {
            let x = ((t - self.start) / (self.end - self.start)) as f32;
            self.from + (self.to - self.from) * x
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamTimeline {
    initial: f32,
    segments: Vec<Segment>,
}

impl ParamTimeline {
    pub fn new(initial: f32) -> Self {
        Self {
            initial,
            segments: Vec::new(),
        }
    }

    pub fn value_at(&self, t: f64) -> f32 {
        match self.segments.iter().rev().find(|s| s.start <= t) {
            Some(seg) => seg.value_at(t),
            None => self.initial,
        }
    }

    /// 在 `at` 时刻跳变到 `value`，取消之后已排程的事件
    pub fn set(&mut self, value: f32, at: f64) {
        self.cancel_from(at);
        self.segments.push(Segment {
            start: at,
            end: at,
            from: value,
            to: value,
        });
    }

    /// 从 `at` 时刻的当前值线性过渡到 `target`
    pub fn ramp(&mut self, target: f32, at: f64, duration: f64) {
        let from = self.value_at(at);
        self.cancel_from(at);
        self.segments.push(Segment {
            start: at,
            end: at + duration.max(0.0),
            from,
            to: target,
        });
    }

    /// 折叠已经结束的事件
    pub fn prune(&mut self, now: f64) {
        if let Some(pos) = self.segments.iter().rposition(|s| s.start <= now && s.end <= now) {
            self.initial = self.segments[pos].to;
            self.segments.drain(..=pos);
        }
    }

    /// 最终值（所有事件完成后）
    pub fn target(&self) -> f32 {
        self.segments.last().map(|s| s.to).unwrap_or(self.initial)
    }

    fn cancel_from(&mut self, at: f64) {
        self.segments.retain(|s| s.start < at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_interpolates() {
        let mut p = ParamTimeline::new(0.0);
        p.ramp(10.0, 1.0, 2.0);
        assert_eq!(p.value_at(0.5), 0.0);
        assert!((p.value_at(2.0) - 5.0).abs() < 1e-5);
        assert_eq!(p.value_at(3.0), 10.0);
        assert_eq!(p.value_at(100.0), 10.0);
    }

    #[test]
    fn test_ramp_starts_from_current_value() {
        let mut p = ParamTimeline::new(0.0);
        p.ramp(10.0, 0.0, 2.0);
        p.ramp(0.0, 1.0, 1.0);
        assert!((p.value_at(1.0) - 5.0).abs() < 1e-5);
        assert_eq!(p.value_at(2.0), 0.0);
    }

    #[test]
    fn test_set_cancels_later_events() {
        let mut p = ParamTimeline::new(1.0);
        p.ramp(5.0, 2.0, 1.0);
        p.set(3.0, 1.0);
        assert_eq!(p.value_at(10.0), 3.0);
        assert_eq!(p.target(), 3.0);
    }

    #[test]
    fn test_prune_keeps_value() {
        let mut p = ParamTimeline::new(0.0);
        p.ramp(4.0, 0.0, 1.0);
        p.set(2.0, 2.0);
        p.prune(3.0);
        assert_eq!(p.value_at(3.0), 2.0);
        assert!(p.segments.is_empty());
    }
}
