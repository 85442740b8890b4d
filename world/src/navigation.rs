//! Shortest walking routes across the street network.

use std::collections::VecDeque;

use cow_game_core::{Address, Grid};
use thiserror::Error;

/// Reasons a route cannot be produced.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PathError {
    /// The start or destination lies outside the grid.
    #[error("address {address:?} lies outside the {width}x{height} grid")]
    OutOfBounds {
        /// Offending address.
        address: Address,
        /// Grid columns.
        width: u32,
        /// Grid rows.
        height: u32,
    },
    /// Every walkable route to the destination is blocked by houses.
    #[error(
        "no path found from {start:?} to {destination:?} on the {}x{} grid",
        .grid.width(),
        .grid.height()
    )]
    NoPathFound {
        /// Grid that was searched.
        grid: Box<Grid>,
        /// Requested start.
        start: Address,
        /// Requested destination.
        destination: Address,
    },
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    previous: Option<Address>,
    cost: u32,
}

/// Finds the shortest 4-connected walk from `start` to `destination`.
///
/// Houses block traversal except for the destination itself. The frontier is
/// expanded first-in first-out with unit step costs, and only the cheapest edge
/// into each address is retained. The returned route includes both ends.
pub fn find_path(
    grid: &Grid,
    start: Address,
    destination: Address,
) -> Result<Vec<Address>, PathError> {
    for address in [start, destination] {
        if !grid.contains(address) {
            return Err(PathError::OutOfBounds {
                address,
                width: grid.width(),
                height: grid.height(),
            });
        }
    }

    let no_path = || PathError::NoPathFound {
        grid: Box::new(grid.clone()),
        start,
        destination,
    };

    let mut best: Vec<Option<Edge>> = vec![None; grid.cells().len()];
    let start_index = grid.index(start).ok_or_else(no_path)?;
    best[start_index] = Some(Edge {
        previous: None,
        cost: 0,
    });

    let mut frontier = VecDeque::new();
    frontier.push_back(start);

    while let Some(current) = frontier.pop_front() {
        if current == destination {
            break;
        }

        let Some(current_cost) = grid
            .index(current)
            .and_then(|index| best[index])
            .map(|edge| edge.cost)
        else {
            continue;
        };
        let next_cost = current_cost.saturating_add(1);

        for neighbor in grid.neighbors(current) {
            if neighbor != destination && grid.is_habitable(neighbor) {
                continue;
            }

            let Some(neighbor_index) = grid.index(neighbor) else {
                continue;
            };

            if best[neighbor_index].is_some_and(|edge| edge.cost <= next_cost) {
                continue;
            }

            best[neighbor_index] = Some(Edge {
                previous: Some(current),
                cost: next_cost,
            });
            frontier.push_back(neighbor);
        }
    }

    let mut route = vec![destination];
    let mut cursor = destination;
    loop {
        let edge = grid
            .index(cursor)
            .and_then(|index| best[index])
            .ok_or_else(no_path)?;
        match edge.previous {
            Some(previous) => {
                route.push(previous);
                cursor = previous;
            }
            None => break,
        }
    }
    route.reverse();

    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cow_game_core::{Cell, Facing, House, TerrainType};

    fn grid_from_rows(rows: &[&str]) -> Grid {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |row| row.len()) as u32;
        Grid::from_fn(width, height, |address| {
            let glyph = rows[address.y() as usize].as_bytes()[address.x() as usize];
            if glyph == b'#' {
                Cell::house(House {
                    house_type: 0,
                    facing: Facing::South,
                })
            } else {
                Cell::street(TerrainType::StreetStraight, Facing::North)
            }
        })
    }

    #[test]
    fn path_to_self_is_a_single_address() {
        let grid = grid_from_rows(&["...", "...", "..."]);
        let start = Address::new(1, 1);
        assert_eq!(find_path(&grid, start, start), Ok(vec![start]));
    }

    #[test]
    fn path_enters_destination_house_but_no_other() {
        let grid = grid_from_rows(&[".##", "...", "..."]);
        let route = find_path(&grid, Address::new(0, 0), Address::new(2, 0)).expect("route");

        assert_eq!(route.first(), Some(&Address::new(0, 0)));
        assert_eq!(route.last(), Some(&Address::new(2, 0)));
        assert_eq!(route.len(), 5);
        for pair in route.windows(2) {
            assert!(pair[0].is_adjacent(pair[1]));
        }
        assert!(!route.contains(&Address::new(1, 0)));
    }

    #[test]
    fn walled_off_destination_reports_no_path() {
        let grid = grid_from_rows(&["..#.", "..##", "...."]);
        let error = find_path(&grid, Address::new(0, 0), Address::new(3, 0)).expect_err("blocked");
        match error {
            PathError::NoPathFound {
                grid: searched,
                start,
                destination,
            } => {
                assert_eq!(*searched, grid);
                assert_eq!(start, Address::new(0, 0));
                assert_eq!(destination, Address::new(3, 0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn out_of_bounds_addresses_are_rejected() {
        let grid = grid_from_rows(&["..", ".."]);
        assert_eq!(
            find_path(&grid, Address::new(0, 0), Address::new(5, 0)),
            Err(PathError::OutOfBounds {
                address: Address::new(5, 0),
                width: 2,
                height: 2,
            })
        );
    }
}
