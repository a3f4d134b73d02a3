use std::time::{Duration, Instant};

#[derive(Clone)]
pub(crate) struct RunTime {
    start: Instant,
    end: Instant,
}

impl RunTime {
    pub(crate) fn since_start(start: Instant) -> Self {
        Self { start, end: Instant::now() }
    }

    pub(crate) fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl serde::Serialize for RunTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let duration = self.duration();
        serializer.serialize_str(&format!("{}.{:03}s", duration.as_secs(), duration.subsec_millis()))
    }
}
