use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashMap;

use crate::models::{Template, TemplateAssignmentMode};

/// Which template each account paints. Under `Random` an account's template
/// is drawn once, the first time it is asked for, and kept for the run.
pub struct TemplateAssignment {
    mode: TemplateAssignmentMode,
    template_ids: Vec<u32>,
    picked: Mutex<HashMap<String, u32>>,
}

impl TemplateAssignment {
    pub fn new(mode: TemplateAssignmentMode, templates: &[Template]) -> Self {
        Self {
            mode,
            template_ids: templates.iter().map(|t| t.id).collect(),
            picked: Mutex::new(HashMap::new()),
        }
    }

    /// Draws templates for `account_ids` up front so every account's choice
    /// is fixed before the first pass.
    pub fn assign_all(&self, account_ids: &[String]) {
        for id in account_ids {
            let _ = self.template_for(id);
        }
    }

    pub fn template_for(&self, account_id: &str) -> Option<u32> {
        match &self.mode {
            TemplateAssignmentMode::Fixed { template_id } => Some(*template_id),
            TemplateAssignmentMode::Random => {
                let mut picked = self.picked.lock();
                if let Some(id) = picked.get(account_id) {
                    return Some(*id);
                }
                let id = *self.template_ids.choose(&mut rand::thread_rng())?;
                picked.insert(account_id.to_string(), id);
                Some(id)
            }
        }
    }
}
