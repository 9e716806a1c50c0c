use serde_json::json;
use statstack::*;

fn stats() -> StatsTable {
    StatsTable::from_json(&json!({ "strength": 10, "speed": 5 })).unwrap()
}

/// A fading buff loses strength each turn and disappears at neutral.
#[test]
fn test_fade_until_gone() {
    let mut stats = stats();
    let adrenaline = ModifiersTable::from_json(
        "adrenaline",
        &json!({
            "strength": ["+", 3],
            "speed": ["*", 2],
            "$events": [{ "name": "turn", "times": 0, "action": "fade", "amount": 1 }],
        }),
    )
    .unwrap();
    stats.stack(adrenaline).unwrap();
    assert_eq!(stats.number("strength").unwrap(), 13.0);
    assert_eq!(stats.number("speed").unwrap(), 10.0);

    assert_eq!(stats.trigger_all("turn"), 1);
    assert_eq!(stats.number("strength").unwrap(), 12.0);
    assert_eq!(stats.number("speed").unwrap(), 5.0);

    stats.trigger_all("turn");
    assert_eq!(stats.number("strength").unwrap(), 11.0);
    assert!(stats.is_stacked("adrenaline"));

    stats.trigger_all("turn");
    assert!(!stats.is_stacked("adrenaline"));
    assert_eq!(stats.number("strength").unwrap(), 10.0);
}

/// A fade that may not destroy keeps the neutral table stacked.
#[test]
fn test_fade_without_destroy() {
    let mut stats = stats();
    let mut echo = ModifiersTable::new("echo");
    echo.set_stat_modifier("strength", ("+", 1.0)).unwrap();
    echo.set_event("tick", 0, 1, EventAction::Fade { amount: 5.0, destroy: Some(false) });
    stats.stack(echo).unwrap();

    stats.trigger("echo", "tick").unwrap();
    assert!(stats.is_stacked("echo"));
    assert_eq!(stats.number("strength").unwrap(), 10.0);
    // Settled events retire.
    assert!(stats.table("echo").unwrap().events("tick").is_empty());
}

/// Countdown events fire on every n-th trigger a limited number of times.
#[test]
fn test_every_and_times() {
    let mut stats = stats();
    let mut haste = ModifiersTable::new("haste");
    haste.set_stat_modifier("speed", ("+", 5.0)).unwrap();
    haste.set_event("turn", 2, 2, EventAction::Deactivate);
    haste.set_event("rest", 1, 1, EventAction::Activate);
    stats.stack(haste).unwrap();

    assert_eq!(stats.trigger("haste", "turn").unwrap(), 0);
    assert_eq!(stats.number("speed").unwrap(), 10.0);
    assert_eq!(stats.trigger("haste", "turn").unwrap(), 1);
    assert_eq!(stats.number("speed").unwrap(), 5.0);

    assert_eq!(stats.trigger("haste", "rest").unwrap(), 1);
    assert_eq!(stats.number("speed").unwrap(), 10.0);
    assert_eq!(stats.trigger("haste", "rest").unwrap(), 0);

    stats.trigger("haste", "turn").unwrap();
    assert_eq!(stats.trigger("haste", "turn").unwrap(), 1);
    assert_eq!(stats.number("speed").unwrap(), 5.0);
    // Both scheduled firings are used up.
    stats.set_table_active("haste", true).unwrap();
    stats.trigger("haste", "turn").unwrap();
    assert_eq!(stats.trigger("haste", "turn").unwrap(), 0);
    assert_eq!(stats.number("speed").unwrap(), 10.0);
}

/// A remove event sweeps the table out of the stats table.
#[test]
fn test_remove_event() {
    let mut stats = stats();
    let mut shield = ModifiersTable::new("shield");
    shield.set_stat_modifier("strength", ("+", 2.0)).unwrap();
    shield.set_event_spec(
        &serde_json::from_value(json!({ "name": "hit", "action": "remove" })).unwrap(),
    );
    stats.stack(shield).unwrap();
    assert_eq!(stats.trigger("shield", "miss").unwrap(), 0);
    assert!(stats.is_stacked("shield"));
    assert_eq!(stats.trigger("shield", "hit").unwrap(), 1);
    assert!(!stats.is_stacked("shield"));
    assert!(matches!(
        stats.trigger("shield", "hit"),
        Err(StatError::UnknownTable(_))
    ));
}

/// Template instances get their own event counters.
#[test]
fn test_template_instances_count_separately() {
    let mut stats = stats();
    let mut burn = ModifiersTable::template("burn");
    burn.set_stat_modifier("speed", ("-", 1.0)).unwrap();
    burn.set_event("turn", 1, 2, EventAction::Remove);

    let first = stats.stack_template(&mut burn).unwrap();
    stats.trigger_all("turn");
    let second = stats.stack_template(&mut burn).unwrap();
    assert_eq!(stats.number("speed").unwrap(), 3.0);

    stats.trigger_all("turn");
    assert!(!stats.is_stacked(&first));
    assert!(stats.is_stacked(&second));
    assert_eq!(stats.number("speed").unwrap(), 4.0);
}
