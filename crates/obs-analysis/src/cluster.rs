use crate::scoring::SuggestionDraft;
use obs_core::snapshot::{Batch, EffortBuckets};
use obs_core::suggestion::EffortTier;
use obs_core::SignalCategory;
use std::collections::{BTreeMap, BTreeSet};

/// Static complexity lookup; deliberately independent of file overlap.
pub fn effort_for(category: SignalCategory) -> EffortTier {
    match category {
        SignalCategory::DataQuality | SignalCategory::WorkflowCompliance => EffortTier::QuickWin,
        SignalCategory::TraceInfrastructure | SignalCategory::TraceCompleteness => {
            EffortTier::Moderate
        }
        SignalCategory::AgentPerformance => EffortTier::Deep,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// One label per input draft, index-aligned.
    pub labels: Vec<String>,
    pub efforts: Vec<EffortTier>,
    pub batches: Vec<Batch>,
    pub effort_buckets: EffortBuckets,
}

impl Clustering {
    pub fn label_for(&self, signal_id: &str) -> Option<&str> {
        self.batches
            .iter()
            .find(|batch| batch.members.iter().any(|member| member == signal_id))
            .map(|batch| batch.label.as_str())
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, index: usize) -> usize {
        let mut root = index;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cursor = index;
        while self.parent[cursor] != root {
            let next = self.parent[cursor];
            self.parent[cursor] = root;
            cursor = next;
        }
        root
    }

    fn union(&mut self, left: usize, right: usize) {
        let left = self.find(left);
        let right = self.find(right);
        if left != right {
            // Keep the earlier index as root so discovery order is preserved.
            let (root, child) = if left < right { (left, right) } else { (right, left) };
            self.parent[child] = root;
        }
    }
}

/// `A`..`Z`, then `AA`, `AB`, ...
pub fn batch_label(index: usize) -> String {
    let mut label = Vec::new();
    let mut remaining = index + 1;
    while remaining > 0 {
        let digit = (remaining - 1) % 26;
        label.push(b'A' + digit as u8);
        remaining = (remaining - 1) / 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// Connected components over "shares at least one target file".
pub fn cluster(drafts: &[SuggestionDraft]) -> Clustering {
    let mut sets = DisjointSet::new(drafts.len());
    let mut first_owner = BTreeMap::<&str, usize>::new();
    for (index, draft) in drafts.iter().enumerate() {
        for file in &draft.implementation.files {
            if let Some(owner) = first_owner.get(file.as_str()).copied() {
                sets.union(owner, index);
            } else {
                first_owner.insert(file.as_str(), index);
            }
        }
    }

    let efforts = drafts
        .iter()
        .map(|draft| effort_for(draft.category))
        .collect::<Vec<_>>();

    let mut label_by_root = BTreeMap::<usize, usize>::new();
    let mut batches: Vec<(Batch, BTreeSet<String>)> = Vec::new();
    let mut labels = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        let root = sets.find(index);
        let batch_index = *label_by_root.entry(root).or_insert_with(|| {
            batches.push((
                Batch {
                    label: batch_label(batches.len()),
                    members: Vec::new(),
                    files: Vec::new(),
                    effort: efforts[index],
                },
                BTreeSet::new(),
            ));
            batches.len() - 1
        });
        let (batch, files) = &mut batches[batch_index];
        batch.members.push(draft.signal_id.clone());
        batch.effort = batch.effort.max(efforts[index]);
        files.extend(draft.implementation.files.iter().cloned());
        labels.push(batch.label.clone());
    }

    let mut effort_buckets = EffortBuckets::default();
    for (draft, effort) in drafts.iter().zip(&efforts) {
        effort_buckets.push(*effort, draft.signal_id.clone());
    }

    Clustering {
        labels,
        efforts,
        batches: batches
            .into_iter()
            .map(|(mut batch, files)| {
                batch.files = files.into_iter().collect();
                batch
            })
            .collect(),
        effort_buckets,
    }
}
