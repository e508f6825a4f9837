//! `pace list [--tree]`

use std::collections::HashSet;

use crate::{config::Config, engine::Engine};

pub fn list(config: &Config, tree: bool) {
    if tree {
        print_task_tree(config);
    } else {
        print_task_list(config);
    }
}

fn print_task_list(config: &Config) {
    println!("Available tasks:");
    println!();

    for (name, task) in &config.tasks {
        let default_marker = if config.default_task.as_deref() == Some(name) {
            " (default)"
        } else {
            ""
        };
        let summary = task.description.as_deref().unwrap_or(&task.command);
        println!("  {name:<20} {summary}{default_marker}");
    }

    if !config.aliases.is_empty() {
        println!("\nAliases:");
        for (alias, target) in &config.aliases {
            println!("  {alias:<20} -> {target}");
        }
    }

    if !config.hooks.is_empty() {
        println!("\nAvailable hooks:");
        for (name, hook) in &config.hooks {
            let summary = hook.description.as_deref().unwrap_or(&hook.command);
            println!("  {name:<20} {summary}");
        }
    }
}

fn print_task_tree(config: &Config) {
    println!("Task dependency tree:");
    println!();

    let engine = Engine::from_config(config);
    let cyclic = engine.cyclic_tasks();
    let mut visited = HashSet::new();

    for name in config.tasks.keys() {
        if !visited.contains(name.as_str()) {
            print_task_node(config, &engine, &cyclic, name, "", &mut visited, &mut HashSet::new());
        }
    }

    for (task, dep) in engine.missing_dependencies() {
        println!();
        println!("  warning: {task} depends on unknown task {dep}");
    }
}

fn print_task_node(
    config: &Config,
    engine: &Engine,
    cyclic: &HashSet<String>,
    name: &str,
    prefix: &str,
    visited: &mut HashSet<String>,
    ancestry: &mut HashSet<String>,
) {
    if !engine.has_task(name) {
        println!("{prefix}{name} (missing)");
        return;
    }
    let Some(task) = config.task(name) else {
        return;
    };

    let mut markers = String::new();
    if config.default_task.as_deref() == Some(name) {
        markers.push_str(" (default)");
    }
    if cyclic.contains(name) {
        markers.push_str(" (circular)");
    }
    println!("{prefix}{name}{markers}");
    visited.insert(name.to_string());

    if ancestry.contains(name) {
        // already printed above with its cycle marker; recursing would loop
        return;
    }
    ancestry.insert(name.to_string());

    let child_prefix = format!("{prefix}  ");
    for dep in &task.dependencies {
        if ancestry.contains(dep) {
            println!("{child_prefix}{dep} (circular)");
            continue;
        }
        print_task_node(config, engine, cyclic, dep, &child_prefix, visited, ancestry);
    }
    ancestry.remove(name);
}

#[cfg(test)]
mod test {
    use super::*;

    // The printers only format; the interesting logic (cycles, missing
    // dependencies) lives in the engine. These just must not loop forever.
    #[test]
    fn test_tree_terminates_on_cycles() {
        let config = Config::from_json(
            r#"{
                "tasks": {
                    "a": { "command": "true", "dependencies": ["b"] },
                    "b": { "command": "true", "dependencies": ["a"] }
                }
            }"#,
        )
        .unwrap();
        print_task_tree(&config);
    }

    #[test]
    fn test_list_handles_every_section() {
        let config = Config::from_json(
            r#"{
                "tasks": { "a": { "command": "true", "description": "builds it" } },
                "hooks": { "h": { "command": "echo" } },
                "aliases": { "x": "a" },
                "default_task": "a"
            }"#,
        )
        .unwrap();
        print_task_list(&config);
    }
}
