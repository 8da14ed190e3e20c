//! Report rendering.
//!
//! Turns a [`KpiResult`] into the documents sent to garages: a standalone HTML page (the email
//! attachment), a Markdown section (collected into the consolidated report) and the HTML cover
//! body of the delivery email. Templates live in `templates/` and are compiled once into a
//! [`minijinja::Environment`]. HTML templates are auto-escaped, Markdown ones are not.

use chrono::NaiveDateTime;
use minijinja::{Environment, Value, context};

use crate::errors::{Error, Result};
use crate::kpi::KpiResult;

const REPORT_HTML: &str = "report.html";
const REPORT_MARKDOWN: &str = "report.md";
const CONSOLIDATED_MARKDOWN: &str = "consolidated.md";
const EMAIL_BODY: &str = "email.html";

/// `15/01/2026 à 09:30`
const GENERATED_AT_FORMAT: &str = "%d/%m/%Y à %H:%M";

/// Title-case a motive label: the first letter of every run of letters is upper-cased and the
/// rest lower-cased (`oil_change` → `Oil_Change`).
pub fn motive_label(motive: &str) -> String {
    let mut label = String::with_capacity(motive.len());
    let mut in_word = false;
    for c in motive.chars() {
        if c.is_alphabetic() {
            if in_word {
                label.extend(c.to_lowercase());
            } else {
                label.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            label.push(c);
            in_word = false;
        }
    }
    label
}

/// Pre-formatted timestamp, marked safe so its slashes stay unescaped
fn timestamp(generated_at: NaiveDateTime) -> Value {
    Value::from_safe_string(generated_at.format(GENERATED_AT_FORMAT).to_string())
}

fn render_error(template: &str) -> impl FnOnce(minijinja::Error) -> Error + '_ {
    move |source| Error::Render {
        template: template.to_string(),
        source,
    }
}

/// Renders KPI reports from the bundled templates.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl ReportRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.add_filter("motive", |value: String| motive_label(&value));

        for (name, source) in [
            (REPORT_HTML, include_str!("templates/report.html")),
            (REPORT_MARKDOWN, include_str!("templates/report.md")),
            (CONSOLIDATED_MARKDOWN, include_str!("templates/consolidated.md")),
            (EMAIL_BODY, include_str!("templates/email.html")),
        ] {
            env.add_template(name, source).map_err(render_error(name))?;
        }

        Ok(Self { env })
    }

    fn render(&self, name: &'static str, ctx: Value) -> Result<String> {
        self.env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(render_error(name))
    }

    /// Standalone HTML report for one tenant and period
    pub fn render_html(&self, kpis: &KpiResult, period: &str, tenant: &str, generated_at: NaiveDateTime) -> Result<String> {
        self.render(
            REPORT_HTML,
            context! {
                kpis,
                period,
                tenant,
                generated_at => timestamp(generated_at),
            },
        )
    }

    /// Markdown section for one tenant and period
    pub fn render_markdown(&self, kpis: &KpiResult, period: &str, tenant: &str) -> Result<String> {
        self.render(REPORT_MARKDOWN, context! { kpis, period, tenant })
    }

    /// All Markdown sections under a single heading, in the order given
    pub fn render_consolidated_markdown(&self, sections: &[String], generated_at: NaiveDateTime) -> Result<String> {
        self.render(
            CONSOLIDATED_MARKDOWN,
            context! {
                sections,
                generated_at => timestamp(generated_at),
            },
        )
    }

    /// Cover body of the delivery email
    pub fn render_email_body(&self, period: &str, sender: &str, generated_at: NaiveDateTime) -> Result<String> {
        self.render(
            EMAIL_BODY,
            context! {
                period,
                sender,
                generated_at => timestamp(generated_at),
            },
        )
    }
}
