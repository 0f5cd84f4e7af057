//! Story template generator.
//!
//! Builds a fill-in-the-blank story from a fixed slot library. Every slot
//! becomes one blank (and therefore one turn); the length class only adds
//! story segments that reuse existing placeholders.

use std::collections::BTreeMap;

use hourglass_types::session::TemplateLength;

/// Word-class slot with the copy shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDef {
    pub slot: &'static str,
    pub prompt: &'static str,
    pub description: &'static str,
    pub example: &'static str,
}

pub const SLOTS: [SlotDef; 23] = [
    SlotDef { slot: "verb", prompt: "Verb", description: "Action word in present tense, something happening right now.", example: "sprint" },
    SlotDef { slot: "verb_past", prompt: "Verb (past tense)", description: "Action that already happened.", example: "hacked" },
    SlotDef { slot: "verb_ing", prompt: "Verb (ending in -ing)", description: "Action in progress or ongoing.", example: "glitching" },
    SlotDef { slot: "adjective", prompt: "Adjective", description: "Word that describes a noun.", example: "luminous" },
    SlotDef { slot: "adverb", prompt: "Adverb", description: "Word that describes how an action happens.", example: "urgently" },
    SlotDef { slot: "number", prompt: "Number", description: "Any number helps track scale or stakes.", example: "47" },
    SlotDef { slot: "exclamation", prompt: "Exclamation / Interjection", description: "A quick burst of feeling or surprise.", example: "Blast!" },
    SlotDef { slot: "animal", prompt: "Animal", description: "Any creature, real or imagined.", example: "manta ray" },
    SlotDef { slot: "color", prompt: "Color", description: "Shade, hue, or combination of colors.", example: "crimson" },
    SlotDef { slot: "body_part", prompt: "Body Part", description: "Part of a body or anatomy.", example: "left antenna" },
    SlotDef { slot: "place", prompt: "Place", description: "Location, setting, or realm.", example: "floating market" },
    SlotDef { slot: "person_name", prompt: "Person's Name", description: "Name, alias, or handle.", example: "Nova Vance" },
    SlotDef { slot: "occupation", prompt: "Occupation", description: "Job, role, or calling.", example: "timeline archivist" },
    SlotDef { slot: "emotion", prompt: "Emotion", description: "Feeling or mood.", example: "awe" },
    SlotDef { slot: "food", prompt: "Food", description: "Anything edible or tasty.", example: "starfruit tart" },
    SlotDef { slot: "liquid", prompt: "Liquid", description: "Any fluid, mundane or exotic.", example: "aurora syrup" },
    SlotDef { slot: "vehicle", prompt: "Vehicle", description: "Something used for transport.", example: "hoverbike" },
    SlotDef { slot: "celebrity", prompt: "Celebrity", description: "Famous person (real or in-universe).", example: "Celeste Halo" },
    SlotDef { slot: "object", prompt: "Object / Thing", description: "Physical item or artifact.", example: "quantum compass" },
    SlotDef { slot: "sound", prompt: "Sound / Noise", description: "Distinct noise, tone, or effect.", example: "static hiss" },
    SlotDef { slot: "relative", prompt: "Relative", description: "Family connection or chosen kin.", example: "great-aunt" },
    SlotDef { slot: "clothing", prompt: "Clothing Item", description: "Something someone can wear.", example: "gravity boots" },
    SlotDef { slot: "silly_word", prompt: "Silly Word", description: "Playful nonsense or made-up slang.", example: "zizzle" },
];

pub fn slot_def(slot: &str) -> Option<&'static SlotDef> {
    SLOTS.iter().find(|d| d.slot == slot)
}

/// One blank in a generated template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blank {
    /// `{slot}_{n}` where `n` is the 1-based slot position.
    pub id: String,
    pub slot: String,
    pub placeholder: String,
    pub prompt: String,
    pub nudge: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeneratedTemplate {
    /// Story with `[[ID::slot]]` placeholders.
    pub template_text: String,
    /// Story with every placeholder shown as `_____`.
    pub original_text: String,
    pub blanks: Vec<Blank>,
    pub word_count: usize,
    pub tag_counts: BTreeMap<String, usize>,
}

/// Placeholder token for blank `id` of `slot`.
pub fn placeholder(id: &str, slot: &str) -> String {
    format!("[[{}::{slot}]]", id.to_uppercase())
}

/// `"{description} Example: {example}."`
pub fn creative_nudge(def: &SlotDef) -> String {
    format!("{} Example: {}.", def.description, def.example.trim_end_matches(['.', '!']))
}

/// Generate a story for `genre` and `length`, optionally opening with the
/// host's seed text.
pub fn generate(genre: Option<&str>, length: TemplateLength, seed: Option<&str>) -> GeneratedTemplate {
    let blanks: Vec<Blank> = SLOTS
        .iter()
        .enumerate()
        .map(|(index, def)| {
            let id = format!("{}_{}", def.slot, index + 1);
            Blank {
                placeholder: placeholder(&id, def.slot),
                id,
                slot: def.slot.to_string(),
                prompt: def.prompt.to_string(),
                nudge: Some(creative_nudge(def)),
            }
        })
        .collect();

    let p = |slot: &str| placeholder_for(&blanks, slot);

    let mut segments: Vec<String> = Vec::new();
    if let Some(seed) = seed.map(str::trim).filter(|s| !s.is_empty()) {
        segments.push(seed.to_string());
    }
    segments.push(genre_intro(genre.unwrap_or(""), p("place"), p("person_name"), p("verb"), p("verb_ing")));
    segments.extend([
        format!("{}! We must {} the vault before the timer flashes {} times.", p("exclamation"), p("verb"), p("number")),
        format!(
            "We already {} across the {}, so {}, our {}, double-checks the {}.",
            p("verb_past"), p("place"), p("person_name"), p("occupation"), p("object")
        ),
        format!(
            "Our {} crew keeps {} {}, feeding off pure {} to stay focused.",
            p("adjective"), p("verb_ing"), p("adverb"), p("emotion")
        ),
        format!(
            "A {} {} bumps everyone's {} for luck while passing around {}.",
            p("color"), p("animal"), p("body_part"), p("food")
        ),
        format!(
            "{} tops off the {} with {}, bragging that even {} approved of the recipe.",
            p("person_name"), p("vehicle"), p("liquid"), p("celebrity")
        ),
        format!(
            "A burst of {} from {}'s comm reminds us to pack the spare {} labeled \"{}\".",
            p("sound"), p("relative"), p("clothing"), p("silly_word")
        ),
    ]);
    if length != TemplateLength::Quick {
        segments.push(format!(
            "After the reveal, we {} toward the {} again, chanting {} in perfect {} rhythm.",
            p("verb_ing"), p("place"), p("silly_word"), p("adverb")
        ));
    }
    if length == TemplateLength::Epic {
        segments.push(format!(
            "By the time the {} lifts off, {} is humming along with the {} while {} streams the victory.",
            p("vehicle"), p("relative"), p("sound"), p("celebrity")
        ));
    }

    let template_text = segments.join(" ");
    let original_text = blank_out(&template_text);
    let word_count = original_text.split_whitespace().count();
    let mut tag_counts = BTreeMap::new();
    for blank in &blanks {
        *tag_counts.entry(blank.slot.clone()).or_insert(0) += 1;
    }

    GeneratedTemplate {
        template_text,
        original_text,
        blanks,
        word_count,
        tag_counts,
    }
}

fn placeholder_for<'a>(blanks: &'a [Blank], slot: &str) -> &'a str {
    blanks
        .iter()
        .find(|b| b.slot == slot)
        .map(|b| b.placeholder.as_str())
        .unwrap_or("_____")
}

fn genre_intro(genre: &str, place: &str, person: &str, verb: &str, verb_ing: &str) -> String {
    let genre = genre.to_lowercase();
    if genre.contains("heist") {
        format!("In the neon glow of the {place}, {person} signals it's time to {verb}.")
    } else if genre.contains("fantasy") || genre.contains("myth") {
        format!("Legends whisper that {person} is {verb_ing} toward the {place} as destiny stirs.")
    } else if genre.contains("comedy") {
        format!("Somehow we ended up back at the {place}, where {person} tries to {verb} without laughing.")
    } else {
        format!("Inside the {place}, {person} cues the squad to {verb} before anyone hesitates.")
    }
}

/// Replace every `[[...]]` placeholder with `_____`.
pub fn blank_out(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("[[") {
        match rest[start..].find("]]") {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push_str("_____");
                rest = &rest[start + end + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
