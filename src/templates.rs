//! Prompt templates.
//!
//! A template wraps the user's text in instructions for one kind of chart.
//! The placeholder `{text}` marks where the text goes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Result, VizgenError};

/// Placeholder replaced by the user's text.
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Template used when a requested key is unknown.
pub const DEFAULT_TEMPLATE: &str = "data-analysis";

/// Where a template came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateOrigin {
    #[default]
    Builtin,
    Custom,
}

/// A named prompt template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub template: String,
    #[serde(default = "custom_origin")]
    pub origin: TemplateOrigin,
}

fn custom_origin() -> TemplateOrigin {
    TemplateOrigin::Custom
}

impl Template {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            template: template.into(),
            origin: TemplateOrigin::Custom,
        }
    }

    /// Substitute every `{text}` with `text`.
    pub fn render(&self, text: &str) -> String {
        self.template.replace(TEXT_PLACEHOLDER, text)
    }

    fn matches(&self, needle: &str) -> bool {
        [&self.name, &self.description, &self.template]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }
}

const BUILTINS: &[(&str, &str, &str, &str)] = &[
    (
        "data-analysis",
        "Data analysis chart",
        "Turn text into a data chart",
        "Turn the following text into a data visualization, using a bar or pie chart to show \
         the distribution and proportions of the key figures.\n\nText: {text}\n\nRequirements:\n\
         - Professional, harmonious colors\n- Clear, readable labels\n- Include a legend and a \
         title\n- Responsive layout",
    ),
    (
        "network",
        "Network graph",
        "Show relationships between entities",
        "Analyse the relationships between the entities in the text and draw a network graph \
         of how they connect.\n\nText: {text}\n\nRequirements:\n- Force-directed layout\n- Node \
         size shows importance\n- Edge width shows relationship strength\n- Hover interaction",
    ),
    (
        "timeline",
        "Timeline",
        "Show events in chronological order",
        "Extract the time-related information in the text and draw a horizontal timeline.\n\n\
         Text: {text}\n\nRequirements:\n- Chronological order\n- Highlight key events\n- Hover \
         interaction\n- Clear date labels\n- Responsive layout",
    ),
    (
        "wordcloud",
        "Word cloud",
        "Keyword frequency at a glance",
        "Analyse word frequency in the text and render an artistic word cloud of the \
         keywords.\n\nText: {text}\n\nRequirements:\n- Frequency sets font size\n- Harmonious \
         color scheme\n- Balanced layout\n- Handle Chinese word segmentation\n- Hover effects",
    ),
    (
        "flowchart",
        "Flowchart",
        "Turn a described process into a flowchart",
        "Turn the process described in the text into a flowchart or decision tree.\n\nText: \
         {text}\n\nRequirements:\n- Clear logic\n- Explicit steps\n- Standard flowchart \
         symbols\n- Conditional branches\n- Tidy layout",
    ),
    (
        "comparison",
        "Comparison",
        "Side-by-side comparison chart",
        "Draw a comparison chart of the comparisons made in the text.\n\nText: {text}\n\n\
         Requirements:\n- Grouped bars or a radar chart\n- Emphasise differences and \
         similarities\n- Clear labels and legend\n- Professional color scheme",
    ),
    (
        "hierarchy",
        "Hierarchy",
        "Tree structure or mind map",
        "Organise the text into a hierarchy diagram or mind map.\n\nText: {text}\n\n\
         Requirements:\n- Clear parent-child relationships\n- Colors distinguish levels\n- Node \
         size shows importance\n- Interactive navigation",
    ),
    (
        "geographic",
        "Geographic",
        "Plot locations on a map",
        "If the text contains geographic information, plot the locations on a map.\n\nText: \
         {text}\n\nRequirements:\n- Simplified map background\n- Accurate markers\n- Hover \
         tooltips\n- Show the related data",
    ),
    (
        "dashboard",
        "Progress dashboard",
        "Turn progress or status into gauges",
        "Turn the progress or status information in the text into a dashboard.\n\nText: \
         {text}\n\nRequirements:\n- Radial gauges or progress bars\n- Clear values\n- \
         Color-coded status\n- Professional look",
    ),
    (
        "report",
        "Report",
        "Combined multi-chart report",
        "Build a comprehensive visual report combining several chart types.\n\nText: {text}\n\n\
         Requirements:\n- Professional layout\n- Consistent charts\n- Title, legend and \
         conclusions\n- Responsive layout",
    ),
];

/// Built-in templates plus user-defined ones.
///
/// Custom templates shadow built-ins with the same key.
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    builtin: BTreeMap<String, Template>,
    custom: BTreeMap<String, Template>,
}

impl TemplateLibrary {
    /// A library holding the ten built-in templates.
    pub fn new() -> Self {
        let builtin = BUILTINS
            .iter()
            .map(|(key, name, description, template)| {
                (
                    (*key).to_string(),
                    Template {
                        name: (*name).to_string(),
                        description: (*description).to_string(),
                        template: (*template).to_string(),
                        origin: TemplateOrigin::Builtin,
                    },
                )
            })
            .collect();
        Self {
            builtin,
            custom: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Template> {
        self.custom.get(key).or_else(|| self.builtin.get(key))
    }

    /// Render the template `key` with `text`.
    ///
    /// Unknown keys fall back to [`DEFAULT_TEMPLATE`].
    pub fn render(&self, key: &str, text: &str) -> String {
        match self.get(key).or_else(|| self.get(DEFAULT_TEMPLATE)) {
            Some(template) => template.render(text),
            None => text.to_string(),
        }
    }

    /// Add or replace a custom template.
    ///
    /// The template must contain the `{text}` placeholder.
    pub fn add_custom(&mut self, key: impl Into<String>, mut template: Template) -> Result<()> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(VizgenError::Configuration(
                "template key must not be empty".into(),
            ));
        }
        if !template.template.contains(TEXT_PLACEHOLDER) {
            return Err(VizgenError::Configuration(format!(
                "template {key:?} is missing the {TEXT_PLACEHOLDER} placeholder"
            )));
        }
        template.origin = TemplateOrigin::Custom;
        self.custom.insert(key, template);
        Ok(())
    }

    /// Remove a custom template. Built-ins cannot be removed.
    pub fn remove_custom(&mut self, key: &str) -> Result<Template> {
        self.custom
            .remove(key)
            .ok_or_else(|| VizgenError::TemplateNotFound(key.to_string()))
    }

    /// All templates by key, custom ones shadowing built-ins.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Template)> {
        self.builtin
            .iter()
            .filter(|(key, _)| !self.custom.contains_key(*key))
            .chain(self.custom.iter())
            .map(|(key, template)| (key.as_str(), template))
    }

    /// Templates whose name, description or body contains `query`
    /// (case-insensitive).
    pub fn search(&self, query: &str) -> Vec<(&str, &Template)> {
        let needle = query.to_lowercase();
        self.iter().filter(|(_, t)| t.matches(&needle)).collect()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}
