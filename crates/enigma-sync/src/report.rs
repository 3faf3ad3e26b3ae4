use crate::ids::FeedId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitOutcome {
    Skipped,
    Completed { messages: usize },
    Failed(String),
    Cancelled,
}

impl UnitOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, UnitOutcome::Failed(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleReport {
    pub primary: UnitOutcome,
    pub feeds: Vec<(FeedId, UnitOutcome)>,
}

impl CycleReport {
    pub fn feed(&self, feed: &FeedId) -> Option<&UnitOutcome> {
        self.feeds
            .iter()
            .find(|(id, _)| id == feed)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> usize {
        let primary = usize::from(self.primary.is_failure());
        primary + self.feeds.iter().filter(|(_, o)| o.is_failure()).count()
    }
}
