//! Procedural world generation: grid layout, habitable houses, and NPC rosters.

use std::time::Duration;

use cow_game_core::{
    Address, Cell, Facing, GameParameters, Grid, House, Npc, NpcId, TerrainType, HOUSE_TYPE_COUNT,
};
use rand::{seq::SliceRandom, Rng};
use thiserror::Error;

use crate::navigation::{find_path, PathError};

const BLOCK_PITCH: u32 = 3;

/// Reasons a world cannot satisfy the requested game parameters.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Fewer houses were generated than NPCs requested.
    #[error("the grid offers {available} habitable houses but {required} NPCs were requested")]
    NotEnoughHouses {
        /// Habitable houses on the generated grid.
        available: usize,
        /// NPCs requested by the parameters.
        required: usize,
    },
    /// The grid has no street cell on its border to use as a bus stop.
    #[error("the grid has no border street to place a spawnpoint on")]
    NoSpawnpoints,
    /// An NPC could not be routed to its home.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Everything world generation produces for a new game.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedWorld {
    /// Generated grid.
    pub grid: Grid,
    /// Address the player starts on.
    pub player_spawn: Address,
    /// Bus stops NPCs arrive at.
    pub spawnpoints: Vec<Address>,
    /// NPCs queued for spawning, ordered by spawn time.
    pub npcs: Vec<Npc>,
}

/// Generates the street grid.
///
/// Streets run along every third row and column; crossings become four-way
/// intersections. Every remaining cell is a grass plot carrying a house of a
/// random type that faces the street row it borders.
pub fn create_grid<R>(width: u32, height: u32, rng: &mut R) -> Grid
where
    R: Rng,
{
    Grid::from_fn(width, height, |address| {
        let is_north_south = address.x() % BLOCK_PITCH == 0;
        let is_east_west = address.y() % BLOCK_PITCH == 0;

        if is_north_south || is_east_west {
            let kind = if is_north_south && is_east_west {
                TerrainType::Street4Way
            } else {
                TerrainType::StreetStraight
            };
            let facing = if is_north_south {
                Facing::North
            } else {
                Facing::East
            };
            Cell::street(kind, facing)
        } else {
            let facing = if address.y() % BLOCK_PITCH == 1 {
                Facing::North
            } else {
                Facing::South
            };
            Cell::house(House {
                house_type: rng.gen_range(0..HOUSE_TYPE_COUNT),
                facing,
            })
        }
    })
}

/// Lazily enumerates every address carrying a house, in row-major order.
pub fn enumerate_habitable_houses(grid: &Grid) -> impl Iterator<Item = Address> + '_ {
    grid.addresses().filter(|address| grid.is_habitable(*address))
}

/// Lazily enumerates the houses that border a street, in row-major order.
///
/// When both extents are multiples of the block pitch the far corner house is
/// fenced in by its neighbours; it is never offered as a home.
pub fn reachable_homes(grid: &Grid) -> impl Iterator<Item = Address> + '_ {
    enumerate_habitable_houses(grid).filter(|home| {
        grid.neighbors(*home)
            .any(|neighbor| !grid.is_habitable(neighbor))
    })
}

/// Lazily enumerates every street address, in row-major order.
pub fn street_addresses(grid: &Grid) -> impl Iterator<Item = Address> + '_ {
    grid.addresses().filter(|address| {
        grid.cell(*address)
            .is_some_and(|cell| cell.terrain.kind.is_street())
    })
}

/// Intersection closest to the middle of the grid.
#[must_use]
pub fn player_spawn(grid: &Grid) -> Address {
    let snap = |extent: u32| (extent / 2) / BLOCK_PITCH * BLOCK_PITCH;
    Address::new(snap(grid.width()), snap(grid.height()))
}

/// Picks up to `count` distinct border streets, excluding `exclude`.
pub fn select_spawnpoints<R>(
    grid: &Grid,
    count: usize,
    exclude: Address,
    rng: &mut R,
) -> Vec<Address>
where
    R: Rng,
{
    let on_border = |address: &Address| {
        address.x() == 0
            || address.y() == 0
            || address.x() + 1 == grid.width()
            || address.y() + 1 == grid.height()
    };

    let mut candidates: Vec<Address> = street_addresses(grid)
        .filter(on_border)
        .filter(|address| *address != exclude)
        .collect();
    candidates.shuffle(rng);
    candidates.truncate(count);
    candidates
}

/// Lazy, single-pass generator of NPC descriptors.
///
/// Each home is paired with the next spawnpoint in round-robin order and routed
/// with [`find_path`]. The generator ends once the homes are exhausted.
#[derive(Debug)]
pub struct NpcGenerator<'a, H> {
    grid: &'a Grid,
    homes: H,
    spawnpoints: &'a [Address],
    spawn_interval: Duration,
    index: u32,
}

impl<H> Iterator for NpcGenerator<'_, H>
where
    H: Iterator<Item = Address>,
{
    type Item = Result<Npc, PathError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.spawnpoints.is_empty() {
            return None;
        }

        let home = self.homes.next()?;
        let index = self.index;
        self.index = self.index.saturating_add(1);

        let spawn_address = self.spawnpoints[index as usize % self.spawnpoints.len()];
        let spawn_time = self.spawn_interval.saturating_mul(index.saturating_add(1));

        Some(find_path(self.grid, spawn_address, home).map(|route| Npc {
            id: NpcId::new(index),
            spawn_address,
            home,
            route,
            spawn_time,
        }))
    }
}

/// Creates the NPC generator; callers shuffle `homes` beforehand for variety.
pub fn generate_npcs<'a, H>(
    grid: &'a Grid,
    homes: H,
    spawnpoints: &'a [Address],
    spawn_interval: Duration,
) -> NpcGenerator<'a, H::IntoIter>
where
    H: IntoIterator<Item = Address>,
{
    NpcGenerator {
        grid,
        homes: homes.into_iter(),
        spawnpoints,
        spawn_interval,
        index: 0,
    }
}

/// Generates the grid, spawnpoints, and NPC roster described by `parameters`.
pub fn generate_world<R>(
    parameters: &GameParameters,
    rng: &mut R,
) -> Result<GeneratedWorld, GenerationError>
where
    R: Rng,
{
    let grid = create_grid(parameters.width, parameters.height, rng);

    let mut homes: Vec<Address> = reachable_homes(&grid).collect();
    if homes.len() < parameters.npc_count {
        return Err(GenerationError::NotEnoughHouses {
            available: homes.len(),
            required: parameters.npc_count,
        });
    }
    homes.shuffle(rng);

    let player_spawn = player_spawn(&grid);
    let spawnpoints =
        select_spawnpoints(&grid, parameters.spawnpoint_count.max(1), player_spawn, rng);
    if spawnpoints.is_empty() {
        return Err(GenerationError::NoSpawnpoints);
    }

    let npcs = generate_npcs(&grid, homes, &spawnpoints, parameters.spawn_interval)
        .take(parameters.npc_count)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GeneratedWorld {
        grid,
        player_spawn,
        spawnpoints,
        npcs,
    })
}
