//! Battle prompt assembly.
//!
//! Participant names never enter the prompt; the model sees opaque
//! placeholders instead, so it cannot mangle or transliterate them. The
//! orchestrator substitutes the real names back after parsing.

use skald_core::types::{CharacterSheet, CombatEvent, WeaponInfo};

pub const PLACEHOLDER_ATTACKER: &str = "<<A>>";
pub const PLACEHOLDER_DEFENDER: &str = "<<D>>";

const DEFAULT_ATTACKER_DESC: &str = "a keen-eyed duelist in plain travel clothes";
const DEFAULT_DEFENDER_DESC: &str = "a stern, battle-worn fighter";

const SYSTEM_PROMPT: &str = "\
You are a master combat narrator with a bold, vivid voice. Draw on the \
character and weapon descriptions and any provided background knowledge, \
and imagine freely within them.
Output rules:
- Match the narration style to the combatants: a plain fighter gets a \
martial-arts tone, an athlete gets a sports tone, a mage gets an arcane \
tone, and so on.
- The battle outcome inside the <battle/> tag is already decided and must \
not be changed.
- Use the knowledge in <attacker_context/> and <defender_context/> to \
enrich each side's portrayal, without copying it verbatim.
- If an <additional_context/> tag is present, weave in its content too.
- Respond with a JSON object whose keys are move_name, narrative, effect. \
No extra fields.
- move_name is the name of the technique itself; it must suit the \
character and must not contain generic words like \"move\" or \"skill\".
- narrative must mention the technique name wrapped in 【】, worked in \
naturally.
- effect is a single sentence and must state the damage value.
- Return only the JSON. Important: do NOT wrap it in ``` fences.
- Participant names appear as the placeholders <<A>> (attacker) and \
<<D>> (defender); never rewrite or transliterate them.";

/// Prose description of a combatant's remaining health.
pub fn health_status(ratio: f32) -> &'static str {
    if ratio >= 0.9 {
        "unscathed"
    } else if ratio >= 0.75 {
        "lightly wounded"
    } else if ratio >= 0.5 {
        "badly wounded"
    } else if ratio >= 0.25 {
        "covered in wounds"
    } else if ratio > 0.0 {
        "at death's door"
    } else {
        "defeated"
    }
}

/// Assemble the ordered prompt segments for one combat event. Retrieval
/// context strings may be empty; their blocks are then omitted entirely.
pub fn build_prompt(
    event: &CombatEvent,
    attacker_context: &str,
    defender_context: &str,
    additional_context: &str,
) -> Vec<String> {
    let attacker_desc = desc_or(&event.attacker, DEFAULT_ATTACKER_DESC);
    let defender_desc = desc_or(&event.defender, DEFAULT_DEFENDER_DESC);
    let attacker_weapon = weapon_or_unarmed(&event.attacker);
    let defender_weapon = weapon_or_unarmed(&event.defender);
    let defender_ratio = event.defender.health_ratio();

    let chars_block = format!(
        "<chars>\n\
         {PLACEHOLDER_ATTACKER}: {attacker_desc}\n\
         \x20 weapon: {}\n\
         {PLACEHOLDER_DEFENDER}: {defender_desc}\n\
         \x20 weapon: {}\n\
         \x20 condition: {} ({:.0}% health)\n\
         </chars>",
        weapon_line(&attacker_weapon),
        weapon_line(&defender_weapon),
        health_status(defender_ratio),
        defender_ratio * 100.0,
    );

    let mut battle_block = format!(
        "<battle>\n\
         - scene: {}\n\
         - attacker: {PLACEHOLDER_ATTACKER}\n\
         - defender: {PLACEHOLDER_DEFENDER}\n\
         - result: {}\n\
         - damage: {}\n\
         </battle>",
        event.room,
        if event.hit { "hit" } else { "miss" },
        event.damage,
    );

    if !attacker_context.is_empty() {
        battle_block.push_str(&format!(
            "\n<attacker_context>\nBackground on {PLACEHOLDER_ATTACKER}:\n{attacker_context}\n</attacker_context>"
        ));
    }
    if !defender_context.is_empty() {
        battle_block.push_str(&format!(
            "\n<defender_context>\nBackground on {PLACEHOLDER_DEFENDER}:\n{defender_context}\n</defender_context>"
        ));
    }
    if !additional_context.is_empty() {
        battle_block.push_str(&format!(
            "\n<additional_context>\n{additional_context}\n</additional_context>"
        ));
    }

    vec![SYSTEM_PROMPT.to_string(), chars_block, battle_block]
}

fn desc_or(character: &CharacterSheet, default: &str) -> String {
    let desc = character.desc.trim();
    if desc.is_empty() {
        default.to_string()
    } else {
        desc.to_string()
    }
}

fn weapon_or_unarmed(character: &CharacterSheet) -> WeaponInfo {
    character
        .weapon
        .clone()
        .unwrap_or_else(WeaponInfo::unarmed)
}

fn weapon_line(weapon: &WeaponInfo) -> String {
    format!("{} ({}) - {}", weapon.name, weapon.kind_name, weapon.desc)
}
