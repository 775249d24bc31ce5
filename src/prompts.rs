// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Prompt templates for the describe and extract stages

use crate::config::PromptConfig;
use crate::models::ModelRequest;

/// Placeholder in the extraction template replaced by the stage-one description
pub const DESCRIPTION_PLACEHOLDER: &str = "{description}";

pub const DESCRIPTION_SYSTEM_PROMPT: &str = "You are an assistant who perfectly describes images.";

pub const DESCRIPTION_USER_PROMPT: &str = "Describe the following image in a paragraph.";

pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

pub const EXTRACTION_TEMPLATE: &str = "\
Prompt: Based on the following detailed image description, create:
 - a concise, matter-of-fact title,
 - a concise, descriptive summary,
 - a short list of keywords,
 - a classification, chosen from these options:
    1. Natural/landscape
    2. Picture of building or structure
    3. Selfie
    4. Friends and Family Picture
    5. None of the above
Only provide the four fields, no additional text or explanation. For example:

[EXAMPLE]

IMAGE DESCRIPTION:
The image features a wooden walkway or bridge, surrounded by a lush green field with tall grass. \
The pathway is located in the middle of the field, providing a connection between different areas. \
The sky above the field is blue, and the overall atmosphere appears serene and peaceful. \
The scene is reminiscent of a park or a countryside setting, where one can enjoy a leisurely walk \
or a quiet moment of reflection.

YOUR RESPONSE:
Title: Wooden Pathway
Summary: The image features a wooden pathway in a lush green field, surrounded by a beautiful landscape. The pathway is lined with grass
Keywords: Grass, nature, pathway
Classification: 1

[/EXAMPLE]

IMAGE DESCRIPTION:
{description}

YOUR RESPONSE:
";

/// Builds the two model requests from static templates and dynamic text.
/// Never calls a model itself.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    description_system: String,
    description_user: String,
    extraction_system: String,
    extraction_template: String,
}

impl PromptBuilder {
    pub fn from_config(config: &PromptConfig) -> Self {
        Self {
            description_system: config.description_system.clone(),
            description_user: config.description_user.clone(),
            extraction_system: config.extraction_system.clone(),
            extraction_template: config.extraction_template.clone(),
        }
    }

    /// Stage one: describe the image in a paragraph
    pub fn description_request(&self, image_b64: &str) -> ModelRequest {
        ModelRequest::new(&self.description_system, &self.description_user)
            .with_image(image_b64)
    }

    /// Stage two: pull title, summary, keywords and classification out of a description
    pub fn extraction_request(&self, description: &str) -> ModelRequest {
        let user = self
            .extraction_template
            .replace(DESCRIPTION_PLACEHOLDER, description.trim());
        ModelRequest::new(&self.extraction_system, &user)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_config(&PromptConfig::default())
    }
}
