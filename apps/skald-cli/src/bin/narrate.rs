use std::env;

use skald_cli::{build_pipeline, init_tracing};
use skald_core::types::{CharacterSheet, CombatEvent, WeaponInfo};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <attacker> <defender> [--miss] [--damage N] [--room <name>]",
            args[0]
        );
        eprintln!("Example: {} Rex Zed --damage 15 --room 'the old arena'", args[0]);
        std::process::exit(1);
    }
    let attacker_name = args[1].clone();
    let defender_name = args[2].clone();
    let mut hit = true;
    let mut damage = 10i32;
    let mut room = "a dusty training yard".to_string();
    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--miss" => {
                hit = false;
                damage = 0;
            }
            "--damage" => {
                if let Some(v) = args.get(i + 1).and_then(|s| s.parse::<i32>().ok()) {
                    damage = v;
                    i += 1;
                } else {
                    eprintln!("Error: --damage requires a number");
                    std::process::exit(1);
                }
            }
            "--room" => {
                if i + 1 < args.len() {
                    room = args[i + 1].clone();
                    i += 1;
                } else {
                    eprintln!("Error: --room requires a name");
                    std::process::exit(1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    let pipeline = build_pipeline().await?;
    if pipeline.auto_index {
        let chunks = pipeline.indexer.reindex(false).await?;
        tracing::info!(chunks, "startup auto-index finished");
    }

    let event = CombatEvent {
        attacker: CharacterSheet {
            name: attacker_name,
            desc: "a wandering swordsman in faded travel clothes".to_string(),
            weapon: Some(WeaponInfo {
                name: "iron longsword".to_string(),
                kind: "sword".to_string(),
                kind_name: "longsword".to_string(),
                desc: "a plain, well-kept blade".to_string(),
            }),
            hp: 80,
            max_hp: 100,
        },
        defender: CharacterSheet {
            name: defender_name,
            desc: "a grizzled mercenary with a scarred jaw".to_string(),
            weapon: None,
            hp: 45,
            max_hp: 100,
        },
        hit,
        damage,
        room,
    };

    let line = pipeline.orchestrator.narrate(&event).await;
    println!("\n{}", line);
    Ok(())
}
