//! Turn a file's code changes into pytest node-id selectors.
//!
//! A modified/added function becomes `file::func`; a method's name is
//! stored as `Class.method` and becomes `file::Class::method`. Deleted
//! items carry nothing left to select and are dropped.

use evb_core::{ChangeType, CodeChange, CodeType};

pub fn selector_for(file: &str, change: &CodeChange) -> Option<String> {
    if matches!(change.change_type, ChangeType::Deleted) {
        return None;
    }

    let path = match change.code_type {
        CodeType::Method => change.name.replace('.', "::"),
        CodeType::Function | CodeType::Class => change.name.clone(),
    };

    Some(format!("{file}::{path}"))
}

/// Build selectors for every file's worth of changes, in the given order.
pub fn selectors_for_changes(changes: &[(String, Vec<CodeChange>)]) -> Vec<String> {
    changes
        .iter()
        .flat_map(|(file, file_changes)| {
            file_changes
                .iter()
                .filter_map(move |change| selector_for(file, change))
        })
        .collect()
}
