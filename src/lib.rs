// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! Form fields of the scheduler and upload pages
//!
//! A [`Page`] holds the controls of a form. A [`FieldSpec`] names the controls that make up
//! one metadata value and is bound against the page into a [`Field`]. The fields of one
//! form mode live in a [`Registry`], the [`FormManager`] validates them as a whole and
//! converts between the page and a [`MetadataDocument`].

pub mod behavior;
pub mod catalog;
pub mod client;
pub mod controller;
pub mod document;
pub mod error;
pub mod field;
pub mod manager;
pub mod page;
pub mod registry;
pub mod series;
pub mod settings;

pub use catalog::{BuildContext, FormKind, Intent, Mode, Recurrence};
pub use controller::{Collaborators, ControllerError, SchedulerController, Submission};
pub use document::{DocumentTree, MetadataDocument};
pub use error::{FormError, Result};
pub use field::{Field, FieldBehavior, FieldSpec, FieldValue, Inputs};
pub use manager::{FormManager, ValidationReport};
pub use page::{Control, ControlKind, Page, PageState};
pub use registry::Registry;
