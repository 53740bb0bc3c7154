//! Linear chain of pipeline stages fed by the source stage

use std::sync::Arc;

use parking_lot::Mutex;

/// One stage of the demultiplexing pipeline
pub trait Filter: Send {
    fn name(&self) -> &'static str;

    /// Consumes one unit of input and hands zero or more units downstream
    fn receive(&mut self, data: &[u8], output: &mut dyn FnMut(&[u8]));

    /// Drops any partial state
    fn reset(&mut self) {}
}

pub type SharedChain = Arc<Mutex<FilterChain>>;

/// Stages in order, with a link flag between each neighbouring pair
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
    links: Vec<bool>,
}

impl FilterChain {
    /// Builds the chain with every link connected
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        let links = vec![true; filters.len().saturating_sub(1)];
        Self { filters, links }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.filters.iter().position(|f| f.name() == name)
    }

    /// Link between stage `index` and stage `index + 1`.
    /// Returns false when there is no such link (the last stage has none).
    pub fn set_link(&mut self, index: usize, connected: bool) -> bool {
        match self.links.get_mut(index) {
            Some(link) => {
                *link = connected;
                true
            }
            None => false,
        }
    }

    pub fn is_linked(&self, index: usize) -> bool {
        self.links.get(index).copied().unwrap_or(false)
    }

    /// Feeds `data` into the first stage
    pub fn push(&mut self, data: &[u8]) {
        push_from(&mut self.filters, &self.links, data);
    }

    pub fn reset(&mut self) {
        for f in &mut self.filters {
            f.reset();
        }
    }
}

fn push_from(filters: &mut [Box<dyn Filter>], links: &[bool], data: &[u8]) {
    let Some((head, rest)) = filters.split_first_mut() else { return };
    let forward = links.first().copied().unwrap_or(false);
    let rest_links = links.get(1..).unwrap_or(&[]);
    head.receive(data, &mut |out| {
        if forward {
            push_from(rest, rest_links, out);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Tap {
        name: &'static str,
        seen: Arc<Mutex<Vec<Vec<u8>>>>,
        resets: Arc<Mutex<usize>>,
    }

    impl Filter for Tap {
        fn name(&self) -> &'static str {
            self.name
        }
        fn receive(&mut self, data: &[u8], output: &mut dyn FnMut(&[u8])) {
            self.seen.lock().push(data.to_vec());
            output(data);
        }
        fn reset(&mut self) {
            *self.resets.lock() += 1;
        }
    }

    fn taps() -> (FilterChain, Vec<Arc<Mutex<Vec<Vec<u8>>>>>, Arc<Mutex<usize>>) {
        let resets = Arc::new(Mutex::new(0));
        let mut seen = Vec::new();
        let mut filters: Vec<Box<dyn Filter>> = Vec::new();
        for name in ["a", "b", "c"] {
            let s = Arc::new(Mutex::new(Vec::new()));
            seen.push(Arc::clone(&s));
            filters.push(Box::new(Tap { name, seen: s, resets: Arc::clone(&resets) }));
        }
        (FilterChain::new(filters), seen, resets)
    }

    #[test]
    fn data_flows_through_connected_links() {
        let (mut chain, seen, _) = taps();
        chain.push(b"x");
        assert!(seen.iter().all(|s| s.lock().len() == 1));
    }

    #[test]
    fn broken_link_stops_downstream() {
        let (mut chain, seen, _) = taps();
        assert!(chain.set_link(1, false));
        chain.push(b"x");
        assert_eq!(seen[1].lock().len(), 1);
        assert!(seen[2].lock().is_empty());
        assert!(!chain.is_linked(1));
        assert!(!chain.set_link(2, true));
        assert!(!chain.set_link(3, true));
    }

    #[test]
    fn reset_reaches_every_stage() {
        let (mut chain, _, resets) = taps();
        chain.reset();
        assert_eq!(*resets.lock(), 3);
        assert_eq!(chain.position("c"), Some(2));
    }
}
