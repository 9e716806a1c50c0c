use serde_json::json;
use statstack::*;

const TOLERANCE: f64 = 1e-9;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < TOLERANCE
}

fn resources() -> StatsTable {
    StatsTable::from_json(&json!({
        "hp": { "$type": "pool", "base": 8 },
        "mana": { "$type": "pool", "base": 100, "reserveFactor": 0.5 },
        "stamina": { "$type": "gauge", "base": 8 },
        "health": { "$type": "history", "base": 100, "min": 0, "max": 100 },
        "karma": { "$type": "alignometer", "minWeight": 4 },
    }))
    .unwrap()
}

/// Losing and replenishing a pool reports the amounts moved.
#[test]
fn test_pool_lose_and_replenish() {
    let mut stats = resources();
    let (hp, mods) = stats.pool_mut("hp").unwrap();
    assert_eq!(hp.lose(5.0, None, &mods), 5.0);
    assert_eq!(hp.actual(&mods), 3.0);
    assert_eq!(hp.replenish(), 5.0);
    assert_eq!(stats.number("hp").unwrap(), 8.0);
}

/// A gain followed by an equal loss leaves `used` where it started.
#[test]
fn test_pool_gain_then_lose_round_trip() {
    let mut stats = resources();
    let (mana, mods) = stats.pool_mut("mana").unwrap();
    mana.lose(40.0, None, &mods);
    let before = mana.used();
    for amount in [0.5, 10.0, 39.0] {
        assert!(approx(mana.gain(amount, None), amount));
        assert!(approx(mana.lose(amount, None, &mods), amount));
        assert!(approx(mana.used(), before));
    }
}

/// An unaffordable spend fails and changes nothing.
#[test]
fn test_pool_spend_is_atomic() {
    let mut stats = resources();
    let (hp, mods) = stats.pool_mut("hp").unwrap();
    assert!(hp.spend(6.0, &mods));
    assert!(!hp.spend(3.0, &mods));
    assert_eq!(hp.used(), 6.0);
    assert_eq!(hp.restore(10.0), 0.0);
    assert_eq!(hp.restore(2.0), 2.0);
    assert_eq!(hp.used(), 4.0);
}

/// Allocations hold headroom without touching the reading.
#[test]
fn test_pool_allocation() {
    let mut stats = resources();
    let (mana, mods) = stats.pool_mut("mana").unwrap();
    assert!(mana.allocate(70.0, &mods));
    assert!(!mana.allocate(40.0, &mods));
    assert_eq!(mana.actual(&mods), 100.0);
    assert_eq!(mana.available(&mods), 30.0);
    assert_eq!(mana.cancel_allocation(), 70.0);

    assert!(mana.allocate(25.0, &mods));
    assert_eq!(mana.commit(), 25.0);
    assert_eq!(stats.number("mana").unwrap(), 75.0);
}

/// Balancing leaves pool and reserve equally depleted.
#[test]
fn test_pool_reserve_balance() {
    let mut stats = resources();
    let (mana, mods) = stats.pool_mut("mana").unwrap();
    assert_eq!(mana.reserve_max(&mods), 50.0);
    mana.lose(60.0, None, &mods);
    assert!(approx(mana.balance(&mods), 20.0));
    assert!(approx(mana.actual(&mods) / mana.max(&mods), 0.6));
    assert!(approx(mana.reserve_actual(&mods) / mana.reserve_max(&mods), 0.6));
}

/// Pool ceilings follow the modifiers stacked on them.
#[test]
fn test_pool_with_modifiers() {
    let mut stats = resources();
    stats
        .stack(ModifiersTable::from_json("fortitude", &json!({ "hp": ["*", 2] })).unwrap())
        .unwrap();
    {
        let (hp, mods) = stats.pool_mut("hp").unwrap();
        assert_eq!(hp.max(&mods), 16.0);
        assert_eq!(hp.lose(10.0, None, &mods), 10.0);
    }
    assert_eq!(stats.number("hp").unwrap(), 6.0);

    // Losing the buff leaves the damage in place, floored at zero.
    stats.unstack("fortitude").unwrap();
    assert_eq!(stats.number("hp").unwrap(), 0.0);
    let breakdown = stats.explain("hp").unwrap();
    assert!(breakdown.steps.is_empty());
}

/// A gauge stops at its bounds and reports the applied change.
#[test]
fn test_gauge_truncates() {
    let mut stats = resources();
    let (stamina, mods) = stats.gauge_mut("stamina").unwrap();
    assert_eq!(stamina.add(-50.0, &mods), -8.0);
    assert_eq!(stamina.actual(&mods), 0.0);
    assert_eq!(stamina.add(3.0, &mods), 3.0);
    assert_eq!(stamina.add(30.0, &mods), 5.0);
    assert_eq!(stats.number("stamina").unwrap(), 8.0);
}

/// Recovery heals the lightest entries first.
#[test]
fn test_history_recover() {
    let mut stats = resources();
    let (health, mods) = stats.history_mut("health").unwrap();
    health.add(-10.0, 1.0, "A");
    health.add(-20.0, 1.0, "B");
    assert_eq!(health.actual(&mods), 70.0);
    assert_eq!(health.recover(20.0), 20.0);
    assert_eq!(
        health.entries(),
        &[HistoryEntry {
            value: -10.0,
            weight: 1.0,
            description: "B".to_string(),
        }]
    );
    assert_eq!(stats.number("health").unwrap(), 90.0);
}

/// Recovery never overshoots an entry and never heals more than exists.
#[test]
fn test_history_recover_bounds() {
    for amount in [0.0, 5.0, 15.0, 45.0, 200.0] {
        let mut health = HistoryGauge::new(100.0);
        health.add(-10.0, 1.0, "bite");
        health.add(-25.0, 1.0, "fall");
        health.add(7.0, 1.0, "potion");
        let injured: f64 = health
            .entries()
            .iter()
            .filter(|e| e.value < 0.0)
            .map(|e| -e.value)
            .sum();

        let recovered = health.recover(amount);
        assert!(approx(recovered, amount.min(injured)));
        assert!(health.entries().iter().all(|e| e.value.abs() > 0.0));
        assert!(health
            .entries()
            .iter()
            .filter(|e| e.description != "potion")
            .all(|e| e.value < 0.0));
    }
}

/// Heavier entries cost more to recover.
#[test]
fn test_history_weighted_recover() {
    let mut health = HistoryGauge::new(100.0);
    health.add(-10.0, 2.0, "poison");
    assert!(approx(health.recover(10.0), 5.0));
    assert!(approx(health.total(), -5.0));
}

/// The alignometer stays inside its range whatever is fed to it.
#[test]
fn test_alignometer_bounds() {
    let mut stats = resources();
    let (karma, mods) = stats.alignometer_mut("karma").unwrap();
    let deeds = [
        (Direction::Up, 500.0, 3.0),
        (Direction::Down, -80.0, 1.0),
        (Direction::Both, 90.0, 10.0),
        (Direction::Up, 100.0, 0.5),
        (Direction::Down, -1000.0, 20.0),
    ];
    for (direction, value, weight) in deeds {
        karma.add(direction, value, weight, "deed");
        let reading = karma.actual(&mods);
        assert!((-100.0..=100.0).contains(&reading), "{} out of range", reading);
        let instant = karma.instant(&mods);
        assert!((-100.0..=100.0).contains(&instant), "{} out of range", instant);
    }
}

/// Neutral entries reduce to a weighted mean padded with the base.
#[test]
fn test_alignometer_neutral_mean() {
    let mut karma = HistoryAlignometer::from_options(AlignometerOptions {
        base: 10.0,
        min_weight: 10.0,
        ..AlignometerOptions::default()
    });
    karma.add(Direction::Both, 50.0, 2.0, "a");
    karma.add(Direction::Both, -20.0, 4.0, "b");
    // (50*2 - 20*4 + 10*4) / 10
    assert!(approx(karma.actual(&Unmodified), 6.0));

    karma.add(Direction::Both, 30.0, 4.0, "c");
    // Enough evidence, no padding.
    assert!(approx(karma.actual(&Unmodified), 140.0 / 10.0));
}

/// Directional entries only pull the reading their own way.
#[test]
fn test_alignometer_directional_absorption() {
    let mut karma = HistoryAlignometer::from_options(AlignometerOptions {
        min_weight: 1.0,
        ..AlignometerOptions::default()
    });
    karma.add(Direction::Both, 20.0, 1.0, "steady");
    karma.add(Direction::Up, 10.0, 5.0, "small kindness");
    assert!(approx(karma.actual(&Unmodified), 20.0));

    karma.add(Direction::Up, 80.0, 1.0, "heroism");
    assert!(approx(karma.actual(&Unmodified), 50.0));
}

/// Typed accessors refuse the wrong kind of stat.
#[test]
fn test_wrong_kind_accessors() {
    let mut stats = resources();
    assert!(matches!(stats.gauge_mut("hp"), Err(StatError::WrongKind { .. })));
    assert!(matches!(stats.pool_mut("karma"), Err(StatError::WrongKind { .. })));
    assert!(matches!(stats.history_mut("nothing"), Err(StatError::UnknownStat(_))));
    assert!(matches!(
        stats.set_base("hp", "full"),
        Err(StatError::WrongKind { .. })
    ));
    stats.set_base("hp", 12.0).unwrap();
    assert_eq!(stats.number("hp").unwrap(), 12.0);
}
