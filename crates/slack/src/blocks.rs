use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into(), emoji: true }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text, .. } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatepickerElement {
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_date: Option<String>,
    pub placeholder: TextObject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TimepickerElement {
    pub action_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_time: Option<String>,
    pub placeholder: TextObject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlainTextInputElement {
    pub action_id: String,
    pub multiline: bool,
    pub initial_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<TextObject>,
}

/// Interactive element inside an actions, section or input block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Button(ButtonElement),
    Datepicker(DatepickerElement),
    Timepicker(TimepickerElement),
    PlainTextInput(PlainTextInputElement),
}

impl Element {
    pub fn action_id(&self) -> &str {
        match self {
            Self::Button(element) => &element.action_id,
            Self::Datepicker(element) => &element.action_id,
            Self::Timepicker(element) => &element.action_id,
            Self::PlainTextInput(element) => &element.action_id,
        }
    }

    pub fn datepicker(action_id: impl Into<String>, initial: Option<NaiveDate>) -> Self {
        Self::Datepicker(DatepickerElement {
            action_id: action_id.into(),
            initial_date: initial.map(|date| date.format("%Y-%m-%d").to_string()),
            placeholder: TextObject::plain("Select a date"),
        })
    }

    pub fn timepicker(action_id: impl Into<String>, initial: Option<NaiveTime>) -> Self {
        Self::Timepicker(TimepickerElement {
            action_id: action_id.into(),
            initial_time: initial.map(|time| time.format("%H:%M").to_string()),
            placeholder: TextObject::plain("Select time"),
        })
    }
}

impl From<ButtonElement> for Element {
    fn from(value: ButtonElement) -> Self {
        Self::Button(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        block_id: String,
        text: TextObject,
    },
    Section {
        block_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<TextObject>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        fields: Vec<TextObject>,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Element>,
    },
    Actions {
        block_id: String,
        elements: Vec<Element>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
    Input {
        block_id: String,
        label: TextObject,
        element: Element,
        optional: bool,
    },
}

impl Block {
    pub fn block_id(&self) -> &str {
        match self {
            Self::Header { block_id, .. }
            | Self::Section { block_id, .. }
            | Self::Actions { block_id, .. }
            | Self::Context { block_id, .. }
            | Self::Input { block_id, .. } => block_id,
        }
    }

    /// Action ids of every interactive element in the block.
    pub fn action_ids(&self) -> Vec<&str> {
        match self {
            Self::Actions { elements, .. } => elements.iter().map(Element::action_id).collect(),
            Self::Section { accessory: Some(element), .. } | Self::Input { element, .. } => {
                vec![element.action_id()]
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Appends `other`'s blocks; the first fallback text wins.
    pub fn followed_by(mut self, other: MessageTemplate) -> Self {
        self.blocks.extend(other.blocks);
        self
    }

    pub fn action_ids(&self) -> Vec<&str> {
        self.blocks.iter().flat_map(Block::action_ids).collect()
    }

    /// Every visible text in the message, joined by newlines. Used by tests and logs.
    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Header { text, .. } => lines.push(text.text()),
                Block::Section { text, fields, .. } => {
                    lines.extend(text.iter().map(TextObject::text));
                    lines.extend(fields.iter().map(TextObject::text));
                }
                Block::Context { elements, .. } => {
                    lines.extend(elements.iter().map(TextObject::text));
                }
                Block::Input { label, .. } => lines.push(label.text()),
                Block::Actions { .. } => {}
            }
        }
        lines.join("\n")
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn header(mut self, block_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Header { block_id: block_id.into(), text: TextObject::plain(text) });
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(builder.build(block_id.into()));
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: Element,
        optional: bool,
    ) -> Self {
        self.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
            optional,
        });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    fields: Vec<TextObject>,
    accessory: Option<Element>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn field(&mut self, text: impl Into<String>) -> &mut Self {
        self.fields.push(TextObject::mrkdwn(text));
        self
    }

    pub fn accessory(&mut self, element: impl Into<Element>) -> &mut Self {
        self.accessory = Some(element.into());
        self
    }

    fn build(self, block_id: String) -> Block {
        let text = match (self.text, self.fields.is_empty()) {
            (Some(text), _) => Some(text),
            (None, true) => Some(TextObject::plain(" ")),
            (None, false) => None,
        };
        Block::Section { block_id, text, fields: self.fields, accessory: self.accessory }
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<Element>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(Element::Button(button));
        self
    }

    pub fn element(&mut self, element: Element) -> &mut Self {
        self.elements.push(element);
        self
    }

    fn build(self) -> Vec<Element> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}
