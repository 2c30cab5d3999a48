use std::collections::{HashMap, VecDeque};

/// Generated PDFs keyed by invoice number. Unbounded unless `max_entries`
/// is set, in which case the oldest insert is evicted first.
#[derive(Debug, Default)]
pub struct PdfCache {
    entries: HashMap<String, Vec<u8>>,
    order: VecDeque<String>,
    max_entries: Option<usize>,
}

impl PdfCache {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self { max_entries, ..Default::default() }
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, key: String, pdf: Vec<u8>) {
        if self.max_entries == Some(0) {
            return;
        }
        if self.entries.insert(key.clone(), pdf).is_none() {
            self.order.push_back(key);
        }
        if let Some(max) = self.max_entries {
            while self.entries.len() > max {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
