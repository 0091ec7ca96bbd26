// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use crate::{
    field::{Field, FieldBehavior, Inputs},
    page::Page,
};

/// Capability checkboxes of a capture agent with a soft cap on the selection
#[derive(Debug, Clone, Copy)]
pub struct ResourcesBehavior {
    max: usize,
}

impl ResourcesBehavior {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    fn selected(field: &Field, page: &Page) -> usize {
        field
            .bound_controls()
            .iter()
            .filter(|id| page.is_checked(id))
            .count()
    }
}

impl FieldBehavior for ResourcesBehavior {
    fn validate(&self, field: &Field, page: &Page, _inputs: &Inputs) -> bool {
        let selected = Self::selected(field, page);

        log::trace!(
            "{} of at most {} resources selected for `{}`",
            selected,
            self.max,
            field.name()
        );

        (!field.is_required() || selected > 0) && selected <= self.max
    }
}
