// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use anyhow::{Context, Result};
use config::{Config, File, FileFormat};
use scheduler_forms::{
    behavior::Clock, catalog, settings::Settings, BuildContext, FormKind, FormManager, Page,
    PageState,
};

/// Reads a page from a TOML file with a `[[controls]]` table per control
pub(crate) fn load_page(path: &str) -> Result<Page> {
    let state: PageState = Config::builder()
        .add_source(File::new(path, FileFormat::Toml))
        .build()
        .and_then(|config| config.try_deserialize())
        .with_context(|| format!("failed to read page state from {path}"))?;

    Ok(Page::from(state))
}

pub(crate) fn build_context(settings: &Settings, page: &Page) -> BuildContext {
    BuildContext {
        zone: settings.forms.zone(),
        resources: catalog::resources_on(page),
        max_resources: settings.forms.max_resources,
        clock: Clock::system(),
    }
}

pub(crate) fn form_manager(settings: &Settings, kind: FormKind, page: &Page) -> Result<FormManager> {
    let context = build_context(settings, page);

    FormManager::for_form(kind, page, &context, settings.forms.namespace.clone())
        .context("failed to build form")
}

/// Serialized document of the page, or the names of the failing fields
pub(crate) fn preview(
    settings: &Settings,
    kind: FormKind,
    page: &mut Page,
    json: bool,
) -> Result<Result<String, Vec<String>>> {
    let manager = form_manager(settings, kind, page)?;

    let report = manager.report(page)?;
    if !report.is_valid() {
        return Ok(Err(report.failed));
    }

    let document = manager.render(page)?;
    let output = if json {
        document.to_json()?
    } else {
        document.to_xml()?
    };

    Ok(Ok(output))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use scheduler_forms::Control;

    #[test]
    fn upload_preview() {
        let settings = Settings::default();
        let mut page = Page::with_controls([
            Control::text("title", "Lecture 1"),
            Control::text("creator", "Ada"),
            Control::text("license", "CC-BY"),
        ]);

        let json = preview(&settings, FormKind::Upload, &mut page, true)
            .unwrap()
            .unwrap();
        let document = scheduler_forms::MetadataDocument::from_json(&json).unwrap();

        assert_eq!(document.root, "mediapackage-metadata");
        assert_eq!(document.get("license"), Some("CC-BY"));
    }

    #[test]
    fn failing_fields_are_listed() {
        let settings = Settings::default();
        let mut page = Page::with_controls([Control::text("title", "")]);

        let failed = preview(&settings, FormKind::Upload, &mut page, false)
            .unwrap()
            .unwrap_err();

        assert_eq!(failed, vec!["title".to_owned()]);
    }

    #[test]
    fn context_keeps_the_named_timezone() {
        let mut settings = Settings::default();
        settings.forms.default_timezone = chrono_tz::Tz::Europe__Berlin;

        let context = build_context(&settings, &Page::new());

        assert_eq!(
            context.zone,
            scheduler_forms::behavior::Zone::Named(chrono_tz::Tz::Europe__Berlin)
        );
    }

    #[test]
    fn page_from_file() {
        let page = load_page("./extra/scheduler-page.toml").unwrap();

        assert_eq!(page.value("title"), "Introduction to Physics");
        assert!(page.is_checked("repeatMon"));
        assert_eq!(catalog::resources_on(&page), vec!["screen", "audio"]);
    }
}
