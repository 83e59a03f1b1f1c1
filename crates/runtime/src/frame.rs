use foundation::time::Time;

/// One dispatch of the single-threaded UI loop.
///
/// Callbacks receive the frame they run in; everything time-dependent
/// (animations, event stamps) reads `time` from here rather than a wall clock,
/// so a session can be replayed deterministically.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    /// 0-based dispatch index.
    pub index: u64,
    /// Session time at the start of the frame.
    pub time: Time,
}

impl Frame {
    pub fn new(index: u64, time: Time) -> Self {
        Self { index, time }
    }

    pub fn start() -> Self {
        Self::new(0, Time::ZERO)
    }

    /// The next frame, `dt_ms` milliseconds later.
    pub fn advance(self, dt_ms: u64) -> Self {
        Self::new(self.index + 1, self.time.after_millis(dt_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::Frame;
    use foundation::time::Time;

    #[test]
    fn advance_moves_index_and_time() {
        let f = Frame::start().advance(16).advance(16);
        assert_eq!(f.index, 2);
        assert_eq!(f.time, Time(0.032));
    }
}
