//! Rating prompts.
//!
//! A prompt pairs instruction text with the scale the answer must fall in, and
//! renders a stimulus into chat messages. Provider-agnostic.

use serde::{Deserialize, Serialize};

use crate::gateway::{ContentPart, ImageDetail, Message};
use crate::scale::RatingScale;
use crate::stimulus::{encode_data_uri, Payload, SourceError, Stimulus};

// =============================================================================
// Presets
// =============================================================================

/// A built-in prompt with its scale.
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    pub slug: &'static str,
    pub description: &'static str,
    pub instructions: &'static str,
    pub scale: RatingScale,
}

impl PromptTemplate {
    pub fn to_prompt(&self) -> RatingPrompt {
        RatingPrompt {
            slug: self.slug.to_string(),
            system: None,
            instructions: self.instructions.to_string(),
            scale: self.scale,
        }
    }
}

pub const BASIC_QUALITY_PROMPT: PromptTemplate = PromptTemplate {
    slug: "basic-quality",
    description: "Image quality, 1-5",
    instructions: r#"Rate this image on a scale from 1-5, where 1 is low quality and 5 is high quality.

Respond with only a single number (1-5)."#,
    scale: RatingScale::ONE_TO_FIVE,
};

pub const EXPRESSIVENESS_PROMPT: PromptTemplate = PromptTemplate {
    slug: "expressiveness",
    description: "Facial emotional expressiveness, 1-7",
    instructions: r#"You are an expert research assistant hired to code thousands
of facial images for a psychology study on emotional expression.
Your job is to evaluate each image and provide a consistent rating based
on the intensity of the emotional expression shown.

Rating Instructions:
For this image, provide a score based on a 1-7 scale, with
7 being high happy or sad expression and 1 indicating low happy or sad expression.

Rules:
- Respond with only a single number (1-7) using standard numerals
- Do not use any special Unicode number characters
- No text, punctuation, or explanation
- Must rate even if uncertain
- Use the full scale range appropriately"#,
    scale: RatingScale::ONE_TO_SEVEN,
};

pub const IMAGE_QUALITY_PROMPT: PromptTemplate = PromptTemplate {
    slug: "image-quality",
    description: "Perceived image quality, 1-100",
    instructions: r#"You are an average US participant from mTurk in a study on the perception of image quality.
How would you rate the quality of this image? Please focus on image quality rather than image aesthetics.
Please provide a Image Quality rating on a scale from 1 to 100 where
1 is "Bad"
25 is "Poor"
50 is "Fair"
75 is "Good"
100 is "Excellent"

Rules:
- Respond with only a single number (1-100)
- No text, punctuation, or explanation
- Must rate even if uncertain
- Use the full scale range appropriately"#,
    scale: RatingScale::ONE_TO_HUNDRED,
};

pub const PALATABILITY_PROMPT: PromptTemplate = PromptTemplate {
    slug: "palatability",
    description: "Food palatability, 1-100",
    instructions: r#"You are an average US participant from mTurk
in a study on the perception of food.
How palatable is this food for you in general?
Please provide a Palatability rating on a scale from 1 to 100
where 1 is "Not at all" and 100 is "Extremely"

Rules:
- Respond with only a single number (1-100)
- No text, punctuation, or explanation
- Must rate even if uncertain
- Use the full scale range appropriately"#,
    scale: RatingScale::ONE_TO_HUNDRED,
};

pub const SENTIMENT_PROMPT: PromptTemplate = PromptTemplate {
    slug: "sentiment",
    description: "Survey response sentiment, 1-7",
    instructions: r#"You are a research assistant coding open-ended survey responses.
Rate the sentiment of this text on a scale from 1 to 7 where:
1 = Very Negative
4 = Neutral
7 = Very Positive

Rules:
- Respond with only a single number (1-7)
- No text, punctuation, or explanation
- Must rate even if uncertain
- Use the full scale range appropriately"#,
    scale: RatingScale::ONE_TO_SEVEN,
};

pub const PRESETS: &[PromptTemplate] = &[
    BASIC_QUALITY_PROMPT,
    EXPRESSIVENESS_PROMPT,
    IMAGE_QUALITY_PROMPT,
    PALATABILITY_PROMPT,
    SENTIMENT_PROMPT,
];

pub fn preset_by_slug(slug: &str) -> Option<&'static PromptTemplate> {
    PRESETS.iter().find(|p| p.slug == slug)
}

// =============================================================================
// Rendering
// =============================================================================

/// A resolved prompt: instructions, optional system message, and scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPrompt {
    pub slug: String,
    #[serde(default)]
    pub system: Option<String>,
    pub instructions: String,
    pub scale: RatingScale,
}

/// Knobs that change message shape but not content.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub image_detail: ImageDetail,
    /// Reasoning models take system text under the `developer` role.
    pub reasoning_model: bool,
}

impl RatingPrompt {
    pub fn custom(instructions: impl Into<String>, scale: RatingScale) -> Self {
        Self {
            slug: "custom".to_string(),
            system: None,
            instructions: instructions.into(),
            scale,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Build the messages for one stimulus.
    ///
    /// Fails only when a local image cannot be read.
    pub fn render(
        &self,
        stimulus: &Stimulus,
        opts: RenderOptions,
    ) -> Result<Vec<Message>, SourceError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(if opts.reasoning_model {
                Message::developer(system)
            } else {
                Message::system(system)
            });
        }

        let image = |url: String| {
            Message::user_parts(vec![
                ContentPart::Text(self.instructions.clone()),
                ContentPart::ImageUrl {
                    url,
                    detail: opts.image_detail,
                },
            ])
        };

        let user = match &stimulus.payload {
            Payload::Text(text) => Message::user(format!(
                "{}\n\nText to rate: \"{}\"",
                self.instructions, text
            )),
            Payload::ImageUrl(url) => image(url.clone()),
            Payload::InlineImage { media_type, data } => {
                image(format!("data:{media_type};base64,{data}"))
            }
            Payload::LocalImage { path, media_type } => image(encode_data_uri(path, media_type)?),
        };
        messages.push(user);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MessageContent, Role};

    #[test]
    fn presets_have_unique_slugs() {
        for (i, a) in PRESETS.iter().enumerate() {
            for b in &PRESETS[i + 1..] {
                assert_ne!(a.slug, b.slug);
            }
        }
        assert_eq!(
            preset_by_slug("palatability").map(|p| p.scale),
            Some(RatingScale::ONE_TO_HUNDRED)
        );
        assert!(preset_by_slug("nope").is_none());
    }

    #[test]
    fn text_stimulus_is_quoted_after_instructions() {
        let prompt = SENTIMENT_PROMPT.to_prompt();
        let msgs = prompt
            .render(&Stimulus::text("r1", "great class"), RenderOptions::default())
            .unwrap();
        assert_eq!(msgs.len(), 1);
        match &msgs[0].content {
            MessageContent::Text(t) => {
                assert!(t.starts_with("You are a research assistant"));
                assert!(t.ends_with("\n\nText to rate: \"great class\""));
            }
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[test]
    fn image_stimulus_becomes_text_plus_image_parts() {
        let prompt = RatingPrompt::custom("Rate it", RatingScale::ONE_TO_FIVE);
        let msgs = prompt
            .render(
                &Stimulus::image_url("https://example.com/a.jpg"),
                RenderOptions::default(),
            )
            .unwrap();
        assert_eq!(
            msgs[0].content,
            MessageContent::Parts(vec![
                ContentPart::Text("Rate it".into()),
                ContentPart::ImageUrl {
                    url: "https://example.com/a.jpg".into(),
                    detail: ImageDetail::High,
                },
            ])
        );
    }

    #[test]
    fn system_message_uses_developer_role_for_reasoning_models() {
        let prompt = RatingPrompt::custom("Rate it", RatingScale::ONE_TO_SEVEN)
            .with_system("You are a content rating assistant.");
        let opts = RenderOptions {
            reasoning_model: true,
            ..Default::default()
        };
        let msgs = prompt.render(&Stimulus::text("a", "b"), opts).unwrap();
        assert_eq!(msgs[0].role, Role::Developer);
        assert_eq!(msgs[1].role, Role::User);
    }

    #[test]
    fn inline_image_renders_data_uri() {
        let prompt = RatingPrompt::custom("Rate it", RatingScale::ONE_TO_FIVE);
        let stimulus = Stimulus {
            id: "x".into(),
            payload: Payload::InlineImage {
                media_type: "image/jpeg".into(),
                data: "QUJD".into(),
            },
        };
        let msgs = prompt.render(&stimulus, RenderOptions::default()).unwrap();
        match &msgs[0].content {
            MessageContent::Parts(parts) => assert_eq!(
                parts[1],
                ContentPart::ImageUrl {
                    url: "data:image/jpeg;base64,QUJD".into(),
                    detail: ImageDetail::High,
                }
            ),
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn unreadable_local_image_is_an_error() {
        let prompt = RatingPrompt::custom("Rate it", RatingScale::ONE_TO_FIVE);
        let stimulus = Stimulus::local_image("gone.png", "/definitely/not/here/gone.png");
        assert!(prompt.render(&stimulus, RenderOptions::default()).is_err());
    }
}
