use crate::model::PageResult;
use crate::states::StateCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateGroup {
    pub state: StateCode,
    pub pages: Vec<usize>,
}

impl StateGroup {
    pub fn entry_name(&self, extension: &str) -> String {
        format!("{}.{}", self.state, extension)
    }
}

/// Resolved pages bucketed by state. Buckets appear in the order their state
/// was first seen; pages inside a bucket ascend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateGroups {
    groups: Vec<StateGroup>,
}

impl StateGroups {
    pub fn iter(&self) -> impl Iterator<Item = &StateGroup> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[cfg(test)]
    pub fn pages_for(&self, state: StateCode) -> Option<&[usize]> {
        self.groups
            .iter()
            .find(|group| group.state == state)
            .map(|group| group.pages.as_slice())
    }
}

pub fn group(results: &[PageResult]) -> StateGroups {
    let mut groups = Vec::<StateGroup>::new();

    for result in results {
        let Some(state) = result.state else {
            continue;
        };

        match groups.iter_mut().find(|group| group.state == state) {
            Some(group) => group.pages.push(result.page_index),
            None => groups.push(StateGroup {
                state,
                pages: vec![result.page_index],
            }),
        }
    }

    StateGroups { groups }
}
