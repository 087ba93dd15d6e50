//! Synthetic bot fillers: ids and display-name pool.

use rand::seq::SliceRandom;

use crate::match_engine::model::PlayerId;

/// Fixed 50-name pool bots draw display labels from.
pub const BOT_NAME_POOL: [&str; 50] = [
    "Ronin", "Vesper", "Quartz", "Nomad", "Ember", "Harbor", "Sable", "Drift", "Lynx", "Cinder",
    "Torque", "Marlin", "Onyx", "Falcon", "Atlas", "Brume", "Cobalt", "Delta", "Echo", "Flare",
    "Griffin", "Halcyon", "Iris", "Juno", "Kestrel", "Lumen", "Mirage", "Nebula", "Ocelot", "Panther",
    "Quasar", "Raven", "Solstice", "Talon", "Umbra", "Vortex", "Wraith", "Xenon", "Yonder", "Zephyr",
    "Anvil", "Basalt", "Cipher", "Dagger", "Ferrous", "Gambit", "Hollow", "Ion", "Jackal", "Kilo",
];

/// Synthetic player id for the `n`th bot filler in a match (1-indexed).
pub fn bot_id(n: u8) -> String {
    format!("BOT{n}")
}

/// Assign `count` distinct display labels from the pool, in random
/// order, paired with sequential `BOT1..BOTcount` ids.
pub fn fill_bots(count: u8) -> Vec<(PlayerId, String)> {
    let mut names: Vec<&str> = BOT_NAME_POOL.to_vec();
    names.shuffle(&mut rand::thread_rng());

    (1..=count)
        .map(|n| {
            let label = names[(n as usize - 1) % names.len()].to_string();
            (PlayerId::Bot(bot_id(n)), label)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_requested_count_with_unique_ids() {
        let bots = fill_bots(3);
        assert_eq!(bots.len(), 3);
        assert_eq!(bots[0].0, PlayerId::Bot("BOT1".to_string()));
        assert_eq!(bots[2].0, PlayerId::Bot("BOT3".to_string()));
    }
}
