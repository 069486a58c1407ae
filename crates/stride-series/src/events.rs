//! Event editing, occurrence lookup and time translation.

use crate::error::SeriesError;
use crate::event::{Event, occurrences};
use crate::series::TimeSeries;

impl TimeSeries {
    /// Append an event. Storage order is not changed otherwise.
    pub fn add_event(&mut self, time: f64, name: impl Into<String>) {
        self.events.push(Event::new(time, name));
    }

    /// Append an event unless a duplicate (same name, time within
    /// `1e-8 + 1e-5 * |t|`) already exists. Returns true if it was added.
    pub fn add_unique_event(&mut self, time: f64, name: impl Into<String>) -> bool {
        let event = Event::new(time, name);
        if self.events.iter().any(|e| event.is_duplicate_of(e)) {
            return false;
        }
        self.events.push(event);
        true
    }

    /// Sort events by ascending time. Ties keep their insertion order.
    pub fn sort_events(&mut self) {
        self.events.sort_by(Event::time_cmp);
    }

    /// Drop every event that duplicates an earlier one.
    pub fn remove_duplicate_events(&mut self) {
        let mut kept: Vec<Event> = Vec::with_capacity(self.events.len());
        for event in self.events.drain(..) {
            if !kept.iter().any(|k| event.is_duplicate_of(k)) {
                kept.push(event);
            }
        }
        self.events = kept;
    }

    /// Rename events named `old`, or only the given occurrence of it.
    ///
    /// Returns the number of renamed events; zero when nothing matches.
    pub fn rename_event(&mut self, old: &str, new: &str, occurrence: Option<usize>) -> usize {
        let targets = self.select_occurrences(old, occurrence);
        for &i in &targets {
            self.events[i].name = new.to_string();
        }
        targets.len()
    }

    /// Remove events named `name`, or only the given occurrence of it.
    ///
    /// Returns the number of removed events; zero when nothing matches.
    pub fn remove_event(&mut self, name: &str, occurrence: Option<usize>) -> usize {
        let mut targets = self.select_occurrences(name, occurrence);
        targets.sort_unstable();
        for &i in targets.iter().rev() {
            self.events.remove(i);
        }
        targets.len()
    }

    /// Drop the events that fall outside `[time[0], time[N-1]]`.
    ///
    /// A series with no samples loses all its events.
    pub fn trim_events(&mut self) {
        let (Some(&first), Some(&last)) = (self.time.first(), self.time.last()) else {
            self.events.clear();
            return;
        };
        self.events.retain(|e| e.time >= first && e.time <= last);
    }

    /// Return the number of events with this name.
    #[must_use]
    pub fn event_count(&self, name: &str) -> usize {
        self.events.iter().filter(|e| e.name == name).count()
    }

    /// Return the position in [`TimeSeries::events`] of an event occurrence.
    ///
    /// Occurrences rank same-named events by time, whatever their storage
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::EventNotFound`] if there are not more than
    /// `occurrence` events named `name`.
    pub fn get_event_index(&self, name: &str, occurrence: usize) -> Result<usize, SeriesError> {
        occurrences(&self.events, name)
            .get(occurrence)
            .copied()
            .ok_or_else(|| SeriesError::EventNotFound {
                name: name.to_string(),
                occurrence,
            })
    }

    /// Return the time of an event occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::EventNotFound`] if the occurrence does not exist.
    pub fn get_event_time(&self, name: &str, occurrence: usize) -> Result<f64, SeriesError> {
        let index = self.get_event_index(name, occurrence)?;
        Ok(self.events[index].time)
    }

    /// Add `delta` to the time vector and to every event time.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::NonFiniteShift`] if `delta` is NaN or infinite;
    /// the series is left unchanged.
    pub fn shift(&mut self, delta: f64) -> Result<(), SeriesError> {
        if !delta.is_finite() {
            return Err(SeriesError::NonFiniteShift { delta });
        }
        self.translate(delta);
        Ok(())
    }

    /// Shift the series so that an event occurrence lands on time zero.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`SeriesError::EventNotFound`] | The occurrence does not exist |
    /// | [`SeriesError::NonFiniteShift`] | The event time is not finite |
    pub fn sync_event(&mut self, name: &str, occurrence: usize) -> Result<(), SeriesError> {
        let time = self.get_event_time(name, occurrence)?;
        self.shift(-time)
    }

    /// Unchecked [`shift`](Self::shift); `delta` must be finite.
    pub(crate) fn translate(&mut self, delta: f64) {
        self.time.mapv_inplace(|t| t + delta);
        for event in &mut self.events {
            event.time += delta;
        }
    }

    fn select_occurrences(&self, name: &str, occurrence: Option<usize>) -> Vec<usize> {
        let all = occurrences(&self.events, name);
        match occurrence {
            None => all,
            Some(k) => all.get(k).copied().into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array1;

    use super::*;
    use crate::error::ErrorKind;

    fn with_events() -> TimeSeries {
        let mut ts = TimeSeries::new(Array1::linspace(0.0, 10.0, 11)).unwrap();
        ts.add_event(5.5, "event1");
        ts.add_event(10.8, "event2");
        ts.add_event(2.3, "event2");
        ts
    }

    #[test]
    fn add_event_keeps_insertion_order() {
        let ts = with_events();
        let names: Vec<_> = ts.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["event1", "event2", "event2"]);
    }

    #[test]
    fn occurrence_lookup_orders_by_time() {
        let ts = with_events();
        assert_eq!(ts.get_event_index("event2", 0).unwrap(), 2);
        assert_eq!(ts.get_event_time("event2", 1).unwrap(), 10.8);
        let err = ts.get_event_time("event2", 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn sort_is_stable() {
        let mut ts = with_events();
        ts.add_event(2.3, "event3");
        ts.sort_events();
        let names: Vec<_> = ts.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["event2", "event3", "event1", "event2"]);
    }

    #[test]
    fn unique_event_is_not_duplicated() {
        let mut ts = with_events();
        assert!(!ts.add_unique_event(5.5, "event1"));
        assert!(ts.add_unique_event(5.5, "event9"));
        assert_eq!(ts.events().len(), 4);
    }

    #[test]
    fn duplicates_are_removed() {
        let mut ts = with_events();
        ts.add_event(5.5, "event1");
        ts.add_event(5.5 + 1e-9, "event1");
        ts.remove_duplicate_events();
        assert_eq!(ts.event_count("event1"), 1);
        assert_eq!(ts.events().len(), 3);
    }

    #[test]
    fn rename_one_occurrence_or_all() {
        let mut ts = with_events();
        assert_eq!(ts.rename_event("event2", "late", Some(1)), 1);
        assert_eq!(ts.events()[1].name, "late");
        assert_eq!(ts.events()[2].name, "event2");

        assert_eq!(ts.rename_event("event2", "early", None), 1);
        assert_eq!(ts.rename_event("missing", "x", None), 0);
        assert_eq!(ts.rename_event("early", "x", Some(3)), 0);
    }

    #[test]
    fn remove_one_occurrence_or_all() {
        let mut ts = with_events();
        assert_eq!(ts.remove_event("event2", Some(0)), 1);
        assert_eq!(ts.events()[1].time, 10.8);

        ts.add_event(0.5, "event1");
        assert_eq!(ts.remove_event("event1", None), 2);
        assert_eq!(ts.events().len(), 1);
        assert_eq!(ts.remove_event("event1", None), 0);
    }

    #[test]
    fn trim_drops_out_of_range() {
        let mut ts = with_events();
        ts.add_event(-1.0, "before");
        ts.add_event(10.0, "last");
        ts.trim_events();
        let names: Vec<_> = ts.events().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["event1", "event2", "last"]);
    }

    #[test]
    fn trim_empty_series_clears_events() {
        let mut ts = TimeSeries::default();
        ts.add_event(0.0, "a");
        ts.trim_events();
        assert!(ts.events().is_empty());
    }

    #[test]
    fn shift_moves_time_and_events() {
        let mut ts = with_events();
        ts.shift(-2.0).unwrap();
        assert_eq!(ts.time()[0], -2.0);
        assert_eq!(ts.events()[0].time, 3.5);
    }

    #[test]
    fn non_finite_shift_leaves_series_unchanged() {
        let mut ts = with_events();
        for delta in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = ts.shift(delta).unwrap_err();
            assert!(matches!(err, SeriesError::NonFiniteShift { .. }));
            assert_eq!(err.kind(), ErrorKind::Structural);
        }
        assert_eq!(ts, with_events());
    }

    #[test]
    fn sync_on_infinite_event_is_rejected() {
        let mut ts = with_events();
        ts.add_event(f64::INFINITY, "end");
        let before = ts.clone();
        let err = ts.sync_event("end", 0).unwrap_err();
        assert!(matches!(err, SeriesError::NonFiniteShift { .. }));
        assert_eq!(ts.time(), before.time());
        assert_eq!(ts.events(), before.events());
    }

    #[test]
    fn sync_event_puts_event_at_zero() {
        let mut ts = with_events();
        ts.sync_event("event2", 0).unwrap();
        assert!((ts.get_event_time("event2", 0).unwrap()).abs() < 1e-12);
        assert!((ts.time()[0] + 2.3).abs() < 1e-12);
        assert!(ts.sync_event("nope", 0).is_err());
    }
}
