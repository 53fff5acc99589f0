//! Versioned schema/data transitions for a storage.

use tracing::{error, info};

use crate::errors::{Error, Result};

/// One ordered, reversible transition. `up` then `down` returns the store
/// data to its prior state.
pub trait Migration {
    fn order(&self) -> u32;
    fn up(&self) -> Result<()>;
    fn down(&self) -> Result<()>;
}

/// Enumerates the migrations of a storage and keeps track of the last
/// applied order.
pub trait MigrationSet {
    fn migrations(&self) -> Vec<Box<dyn Migration + '_>>;
    fn last_applied(&self) -> Result<u32>;
    fn save_applied_number(&self, number: u32) -> Result<()>;
}

/// Drives a [`MigrationSet`] up or down.
pub struct Migrator<S> {
    set: S,
}

impl<S: MigrationSet> Migrator<S> {
    pub fn new(set: S) -> Self {
        Self { set }
    }

    /// Applies every migration above the last applied order, ascending.
    /// With `number`, applies exactly that one migration.
    pub fn up(&self, number: Option<u32>) -> Result<()> {
        match number {
            Some(number) => {
                let migrations = self.set.migrations();
                let migration = find(&migrations, number)?;
                run(migration.up(), number, "up")?;
                self.set.save_applied_number(number)
            }
            None => {
                let last_applied = self.set.last_applied()?;
                let mut migrations = self.set.migrations();
                migrations.sort_by_key(|m| m.order());
                for migration in migrations.iter().filter(|m| m.order() > last_applied) {
                    run(migration.up(), migration.order(), "up")?;
                    self.set.save_applied_number(migration.order())?;
                }
                Ok(())
            }
        }
    }

    /// Unapplies migrations down to order zero, descending.
    /// With `number`, unapplies exactly that one migration.
    pub fn down(&self, number: Option<u32>) -> Result<()> {
        match number {
            Some(number) => {
                let migrations = self.set.migrations();
                let migration = find(&migrations, number)?;
                run(migration.down(), number, "down")?;
                self.set.save_applied_number(number.saturating_sub(1))
            }
            None => {
                let last_applied = self.set.last_applied()?;
                let mut migrations = self.set.migrations();
                migrations.sort_by_key(|m| std::cmp::Reverse(m.order()));
                for migration in migrations.iter().filter(|m| m.order() <= last_applied) {
                    run(migration.down(), migration.order(), "down")?;
                    self.set
                        .save_applied_number(migration.order().saturating_sub(1))?;
                }
                Ok(())
            }
        }
    }
}

fn find<'a>(
    migrations: &'a [Box<dyn Migration + 'a>],
    number: u32,
) -> Result<&'a (dyn Migration + 'a)> {
    migrations
        .iter()
        .find(|m| m.order() == number)
        .map(|m| &**m)
        .ok_or_else(|| Error::BadArgument(format!("no migration with order {}", number)))
}

fn run(outcome: Result<()>, order: u32, direction: &str) -> Result<()> {
    match outcome {
        Ok(()) => {
            info!(order, direction, "applied migration");
            Ok(())
        }
        // irreversibility is its own condition, not a generic failure
        Err(err @ Error::Irreversible(_)) => {
            error!(order, direction, error = %err, "migration step cannot be reverted");
            Err(err)
        }
        Err(err) => {
            error!(order, direction, error = %err, "migration step failed");
            Err(Error::Migration(format!(
                "step {} ({}) failed: {}",
                order, direction, err
            )))
        }
    }
}
