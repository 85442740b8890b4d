#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the cow game kernel.
//!
//! This crate defines the message surface that connects external collaborators,
//! the authoritative model, and the pure reducer. Collaborators enqueue commands
//! describing what they want to happen, commands inspect an immutable [`Model`]
//! and emit [`Event`] values, and the reducer folds every event into a new
//! model. Subscribers observe `(event, version, model)` triples and never a
//! partially applied state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of distinct house meshes a habitable cell may carry.
pub const HOUSE_TYPE_COUNT: u8 = 20;

/// Location of a single grid cell expressed as column (`x`) and row (`y`).
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Address {
    x: u32,
    y: u32,
}

impl Address {
    /// Creates a new grid address.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Zero-based column of the address.
    #[must_use]
    pub const fn x(&self) -> u32 {
        self.x
    }

    /// Zero-based row of the address.
    #[must_use]
    pub const fn y(&self) -> u32 {
        self.y
    }

    /// Computes the Manhattan distance between two addresses.
    #[must_use]
    pub fn manhattan_distance(self, other: Address) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Reports whether the two addresses share an edge.
    #[must_use]
    pub fn is_adjacent(self, other: Address) -> bool {
        self.manhattan_distance(other) == 1
    }
}

/// Free position within the world, measured in grid units.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal component.
    pub x: f32,
    /// Vertical component.
    pub y: f32,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Address> for Position {
    fn from(address: Address) -> Self {
        Self::new(address.x() as f32, address.y() as f32)
    }
}

/// Cardinal orientation applied to terrain tiles and houses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    /// Toward decreasing rows.
    North,
    /// Toward increasing columns.
    East,
    /// Toward increasing rows.
    South,
    /// Toward decreasing columns.
    West,
}

/// Ground tile laid under every cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainType {
    /// Grass plot that may carry a house.
    Grass,
    /// Straight stretch of street.
    StreetStraight,
    /// Intersection where two streets cross.
    Street4Way,
}

impl TerrainType {
    /// Reports whether the terrain is part of the street network.
    #[must_use]
    pub const fn is_street(self) -> bool {
        matches!(self, Self::StreetStraight | Self::Street4Way)
    }
}

/// House standing on a grass cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct House {
    /// Index of the house model, below [`HOUSE_TYPE_COUNT`].
    pub house_type: u8,
    /// Direction the front door faces.
    pub facing: Facing,
}

/// Terrain descriptor of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Terrain {
    /// Kind of ground tile.
    pub kind: TerrainType,
    /// Orientation of the ground tile.
    pub facing: Facing,
}

/// Single cell of the world grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    /// House standing on the cell, if the cell is habitable.
    pub house: Option<House>,
    /// Ground tile of the cell.
    pub terrain: Terrain,
}

impl Cell {
    /// Creates a street cell without a house.
    #[must_use]
    pub const fn street(kind: TerrainType, facing: Facing) -> Self {
        Self {
            house: None,
            terrain: Terrain { kind, facing },
        }
    }

    /// Creates a grass cell carrying the provided house.
    #[must_use]
    pub const fn house(house: House) -> Self {
        Self {
            house: Some(house),
            terrain: Terrain {
                kind: TerrainType::Grass,
                facing: Facing::North,
            },
        }
    }

    /// Reports whether a house stands on the cell.
    #[must_use]
    pub const fn is_habitable(&self) -> bool {
        self.house.is_some()
    }
}

/// Reasons a grid cannot be assembled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    /// The number of cells does not match the requested dimensions.
    #[error("expected {expected} cells for the grid dimensions but received {actual}")]
    CellCountMismatch {
        /// Number of cells implied by width and height.
        expected: usize,
        /// Number of cells supplied.
        actual: usize,
    },
}

/// Fixed-size tile grid stored in row-major order.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Assembles a grid from row-major cells, checking the cell count.
    pub fn new(width: u32, height: u32, cells: Vec<Cell>) -> Result<Self, GridError> {
        let expected = (width as usize).saturating_mul(height as usize);
        if cells.len() != expected {
            return Err(GridError::CellCountMismatch {
                expected,
                actual: cells.len(),
            });
        }

        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Builds a grid by asking `cell_at` for every address in row-major order.
    #[must_use]
    pub fn from_fn<F>(width: u32, height: u32, mut cell_at: F) -> Self
    where
        F: FnMut(Address) -> Cell,
    {
        let mut cells = Vec::with_capacity((width as usize).saturating_mul(height as usize));
        for y in 0..height {
            for x in 0..width {
                cells.push(cell_at(Address::new(x, y)));
            }
        }

        Self {
            width,
            height,
            cells,
        }
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Reports whether the address lies within the grid.
    #[must_use]
    pub const fn contains(&self, address: Address) -> bool {
        address.x() < self.width && address.y() < self.height
    }

    /// Row-major index of the address, if it lies within the grid.
    #[must_use]
    pub fn index(&self, address: Address) -> Option<usize> {
        if !self.contains(address) {
            return None;
        }
        let width = usize::try_from(self.width).ok()?;
        let x = usize::try_from(address.x()).ok()?;
        let y = usize::try_from(address.y()).ok()?;
        y.checked_mul(width)?.checked_add(x)
    }

    /// Address of the provided row-major index.
    #[must_use]
    pub fn address_of(&self, index: usize) -> Option<Address> {
        if index >= self.cells.len() || self.width == 0 {
            return None;
        }
        let width = self.width as usize;
        let x = u32::try_from(index % width).ok()?;
        let y = u32::try_from(index / width).ok()?;
        Some(Address::new(x, y))
    }

    /// Cell stored at the address.
    #[must_use]
    pub fn cell(&self, address: Address) -> Option<&Cell> {
        self.index(address).and_then(|index| self.cells.get(index))
    }

    /// Reports whether a house stands at the address.
    #[must_use]
    pub fn is_habitable(&self, address: Address) -> bool {
        self.cell(address).is_some_and(Cell::is_habitable)
    }

    /// Iterates over every address in row-major order.
    pub fn addresses(&self) -> impl Iterator<Item = Address> + '_ {
        (0..self.cells.len()).filter_map(|index| self.address_of(index))
    }

    /// Addresses sharing an edge with the provided one, clipped to the grid.
    pub fn neighbors(&self, address: Address) -> impl Iterator<Item = Address> {
        let mut candidates = [None; 4];
        if let Some(y) = address.y().checked_sub(1) {
            candidates[0] = Some(Address::new(address.x(), y));
        }
        if address.x() + 1 < self.width {
            candidates[1] = Some(Address::new(address.x() + 1, address.y()));
        }
        if address.y() + 1 < self.height {
            candidates[2] = Some(Address::new(address.x(), address.y() + 1));
        }
        if let Some(x) = address.x().checked_sub(1) {
            candidates[3] = Some(Address::new(x, address.y()));
        }
        candidates.into_iter().flatten()
    }
}

/// Unique identifier assigned to an NPC for its whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NpcId(u32);

impl NpcId {
    /// Creates a new NPC identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier assigned to a thrown horse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HorseId(u32);

impl HorseId {
    /// Creates a new horse identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Villager walking from a bus stop to their home.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Npc {
    /// Stable identifier.
    pub id: NpcId,
    /// Bus stop the NPC arrives at.
    pub spawn_address: Address,
    /// House the NPC walks to.
    pub home: Address,
    /// Precomputed walk from `spawn_address` to `home`, both inclusive.
    pub route: Vec<Address>,
    /// Game time at which the NPC is due to spawn.
    pub spawn_time: Duration,
}

impl Npc {
    /// Game time at which the NPC runs out of patience.
    #[must_use]
    pub fn death_time(&self, lifespan: Duration) -> Duration {
        self.spawn_time.saturating_add(lifespan)
    }
}

/// Tunable parameters of a single game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameParameters {
    /// Seed driving world generation.
    pub seed: u64,
    /// Grid columns.
    pub width: u32,
    /// Grid rows.
    pub height: u32,
    /// Number of NPCs queued at the start of the game.
    pub npc_count: usize,
    /// Number of bus stops NPCs are spread across.
    pub spawnpoint_count: usize,
    /// Delay between consecutive NPC spawns.
    pub spawn_interval: Duration,
    /// Time an NPC survives after spawning.
    pub npc_lifespan: Duration,
    /// Points awarded per house won.
    pub points_per_house: i64,
    /// Points awarded per horse thrown; negative values make horses a cost.
    pub points_per_horse: i64,
}

impl Default for GameParameters {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 10,
            height: 10,
            npc_count: 5,
            spawnpoint_count: 3,
            spawn_interval: Duration::from_secs(3),
            npc_lifespan: Duration::from_secs(30),
            points_per_house: 100,
            points_per_horse: -10,
        }
    }
}

/// Phase of the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameState {
    /// No game has been started yet.
    #[default]
    NotStarted,
    /// A game is in progress.
    Playing,
    /// The game finished; only a new game may follow.
    GameOver,
}

/// Score snapshot derived from the resolved outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    /// Weighted total.
    pub points: i64,
    /// Houses saved by intercepting their owner.
    pub houses_won: u32,
    /// Houses whose owner made it home.
    pub houses_lost: u32,
    /// Horses thrown so far.
    pub horses_spawned: u32,
    /// NPC homes still unresolved.
    pub houses_remaining: u32,
}

impl Score {
    /// Computes the score for the provided tallies.
    ///
    /// `points = points_per_house × houses_won + points_per_horse × horses_spawned`.
    #[must_use]
    pub fn tally(
        parameters: &GameParameters,
        houses_won: u32,
        houses_lost: u32,
        horses_spawned: u32,
        houses_remaining: u32,
    ) -> Self {
        let points = parameters
            .points_per_house
            .saturating_mul(i64::from(houses_won))
            .saturating_add(
                parameters
                    .points_per_horse
                    .saturating_mul(i64::from(horses_spawned)),
            );
        Self {
            points,
            houses_won,
            houses_lost,
            horses_spawned,
            houses_remaining,
        }
    }
}

/// Subject the camera and UI are focused on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Focus {
    /// A live NPC.
    Npc(NpcId),
    /// A house on the grid.
    House(Address),
}

/// Authoritative, versioned game state.
///
/// Models are never mutated after publication; every transition produces a new
/// value.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    /// Phase of the game.
    pub game_state: GameState,
    /// Parameters the game was started with.
    pub parameters: GameParameters,
    /// Current score snapshot.
    pub score: Score,
    /// World grid, generated once per game.
    pub grid: Grid,
    /// Address the player starts on.
    pub player_spawn: Address,
    /// Last destination the player was sent to.
    pub player_destination: Option<Position>,
    /// Current camera focus.
    pub focus: Option<Focus>,
    /// NPCs waiting for their bus, ordered by spawn time.
    pub npcs_to_spawn: Vec<Npc>,
    /// NPCs currently walking home.
    pub npcs: Vec<Npc>,
    /// Homes reached by their NPC.
    pub houses_lost: Vec<Address>,
    /// Homes saved by intercepting their NPC.
    pub houses_won: Vec<Address>,
    /// Horses thrown so far.
    pub horses_spawned: u32,
}

impl Model {
    /// Live NPC with the provided identifier.
    #[must_use]
    pub fn live_npc(&self, id: NpcId) -> Option<&Npc> {
        self.npcs.iter().find(|npc| npc.id == id)
    }

    /// Reports whether a game is in progress.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.game_state == GameState::Playing
    }
}

/// Facts describing every permissible model transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// A fresh world was generated and a game begins.
    NewGameStarted {
        /// Parameters the game runs with.
        parameters: GameParameters,
        /// Generated world grid.
        grid: Grid,
        /// Address the player starts on.
        player_spawn: Address,
        /// NPCs queued for spawning, ordered by spawn time.
        npcs_to_spawn: Vec<Npc>,
    },
    /// The player was sent toward a new position.
    DestinationUpdated {
        /// Position the player walks toward.
        position: Position,
    },
    /// A horse was thrown.
    HorseSpawned {
        /// Identifier assigned to the horse.
        horse: HorseId,
    },
    /// An NPC stepped off the bus.
    NpcSpawned {
        /// NPC promoted from the spawn queue.
        npc: Npc,
    },
    /// An NPC reached its home; the house is lost.
    NpcArrivedAtHome {
        /// NPC that arrived.
        npc: Npc,
        /// Home the NPC reached.
        home: Address,
    },
    /// An NPC was intercepted; the house is won.
    NpcExploded {
        /// NPC that exploded.
        npc: Npc,
        /// Home the NPC never reached.
        home: Address,
    },
    /// The camera should follow an NPC.
    NpcFocused {
        /// NPC to follow.
        npc: NpcId,
    },
    /// The camera should look at a house.
    HouseFocused {
        /// House address.
        house: Address,
    },
    /// The game finished.
    GameEnded,
}

/// Payload-free discriminant of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// See [`Event::NewGameStarted`].
    NewGameStarted,
    /// See [`Event::DestinationUpdated`].
    DestinationUpdated,
    /// See [`Event::HorseSpawned`].
    HorseSpawned,
    /// See [`Event::NpcSpawned`].
    NpcSpawned,
    /// See [`Event::NpcArrivedAtHome`].
    NpcArrivedAtHome,
    /// See [`Event::NpcExploded`].
    NpcExploded,
    /// See [`Event::NpcFocused`].
    NpcFocused,
    /// See [`Event::HouseFocused`].
    HouseFocused,
    /// See [`Event::GameEnded`].
    GameEnded,
}

impl EventKind {
    /// Every event kind, in declaration order.
    pub const ALL: [EventKind; 9] = [
        Self::NewGameStarted,
        Self::DestinationUpdated,
        Self::HorseSpawned,
        Self::NpcSpawned,
        Self::NpcArrivedAtHome,
        Self::NpcExploded,
        Self::NpcFocused,
        Self::HouseFocused,
        Self::GameEnded,
    ];

    /// Stable name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewGameStarted => "NewGameStarted",
            Self::DestinationUpdated => "DestinationUpdated",
            Self::HorseSpawned => "HorseSpawned",
            Self::NpcSpawned => "NpcSpawned",
            Self::NpcArrivedAtHome => "NpcArrivedAtHome",
            Self::NpcExploded => "NpcExploded",
            Self::NpcFocused => "NpcFocused",
            Self::HouseFocused => "HouseFocused",
            Self::GameEnded => "GameEnded",
        }
    }
}

impl Event {
    /// Discriminant of the event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::NewGameStarted { .. } => EventKind::NewGameStarted,
            Self::DestinationUpdated { .. } => EventKind::DestinationUpdated,
            Self::HorseSpawned { .. } => EventKind::HorseSpawned,
            Self::NpcSpawned { .. } => EventKind::NpcSpawned,
            Self::NpcArrivedAtHome { .. } => EventKind::NpcArrivedAtHome,
            Self::NpcExploded { .. } => EventKind::NpcExploded,
            Self::NpcFocused { .. } => EventKind::NpcFocused,
            Self::HouseFocused { .. } => EventKind::HouseFocused,
            Self::GameEnded => EventKind::GameEnded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Address, Cell, Event, EventKind, Facing, GameParameters, GameState, Grid, GridError,
        Model, Score, TerrainType,
    };

    fn street_grid(width: u32, height: u32) -> Grid {
        let cells = vec![
            Cell::street(TerrainType::StreetStraight, Facing::North);
            (width * height) as usize
        ];
        Grid::new(width, height, cells).expect("grid")
    }

    #[test]
    fn manhattan_distance_matches_expectation() {
        let origin = Address::new(1, 1);
        let destination = Address::new(4, 3);
        assert_eq!(origin.manhattan_distance(destination), 5);
        assert!(origin.is_adjacent(Address::new(1, 2)));
        assert!(!origin.is_adjacent(Address::new(2, 2)));
    }

    #[test]
    fn grid_rejects_mismatched_cell_count() {
        let cells = vec![Cell::street(TerrainType::Street4Way, Facing::North); 5];
        assert_eq!(
            Grid::new(2, 3, cells),
            Err(GridError::CellCountMismatch {
                expected: 6,
                actual: 5
            })
        );
    }

    #[test]
    fn grid_indexes_row_major() {
        let grid = street_grid(4, 3);
        assert_eq!(grid.index(Address::new(1, 2)), Some(9));
        assert_eq!(grid.address_of(9), Some(Address::new(1, 2)));
        assert_eq!(grid.index(Address::new(4, 0)), None);
        let first: Vec<_> = grid.addresses().take(5).collect();
        assert_eq!(first[4], Address::new(0, 1));
    }

    #[test]
    fn neighbors_are_clipped_to_the_grid() {
        let grid = street_grid(3, 3);
        let corner: Vec<_> = grid.neighbors(Address::new(0, 0)).collect();
        assert_eq!(corner, vec![Address::new(1, 0), Address::new(0, 1)]);
        assert_eq!(grid.neighbors(Address::new(1, 1)).count(), 4);
    }

    #[test]
    fn score_tally_weights_houses_and_horses() {
        let parameters = GameParameters {
            points_per_house: 100,
            points_per_horse: -10,
            ..GameParameters::default()
        };
        let score = Score::tally(&parameters, 2, 1, 3, 4);
        assert_eq!(score.points, 170);
        assert_eq!(score.houses_remaining, 4);
    }

    #[test]
    fn event_kinds_cover_every_variant_once() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|kind| kind.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
        assert_eq!(Event::GameEnded.kind(), EventKind::GameEnded);
    }

    #[test]
    fn events_serialize_with_variant_names() {
        let json = serde_json::to_string(&Event::GameEnded).expect("serialize");
        assert_eq!(json, "\"GameEnded\"");
    }

    #[test]
    fn initial_model_waits_for_a_game() {
        let model = Model::default();
        assert_eq!(model.game_state, GameState::NotStarted);
        assert_eq!(model.player_spawn, Address::new(0, 0));
        assert!(model.grid.cells().is_empty());
        assert!(!model.is_playing());
    }
}
