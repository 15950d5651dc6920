//! Packet ordering and tile-part splitting (spec §4.11, §9 Open Question on
//! progression order).
//!
//! A codestream's COD marker names one of five nested nestings over
//! `(layer, resolution, component, precinct)` — [`sequence`] enumerates them
//! in the order a tile-part's packets are actually written/read.
//!
//! Grounded on OpenJPH's `ojph_codestream.cpp` packet iterator (same four-axis
//! nesting, one loop order per `COD` progression value) and reworked here as
//! a plain `Vec<PacketCoord>` builder rather than a stateful iterator, since
//! every axis's extent is already known up front once a tile has been
//! analyzed.

use crate::j2k::{ProgressionOrder, TilePartDivision};

/// One packet's position along every axis a progression order can nest over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCoord {
    pub layer: u16,
    pub resolution: u8,
    pub component: u16,
    pub precinct: u32,
}

/// Enumerates every packet coordinate for one tile, in the order `order`
/// prescribes. `precinct_counts` gives the number of precincts at each
/// resolution (index 0 = coarsest), shared by every component — this engine
/// always analyzes every component of a tile at the same decomposition depth
/// and precinct partition, so a per-component count is never needed.
///
/// `PCRL`/`CPRL`'s "position" axis is, in the standard, a shared spatial grid
/// reconciled across resolutions of different precinct size. This engine
/// keeps precinct partitions independent per resolution (see
/// `crate::j2k::packet::partition_precincts`), so position here is simply a
/// flat precinct index, valid only up to that resolution's own precinct
/// count — out-of-range combinations are skipped rather than reconciled
/// against a common grid. This sidesteps the tie-breaking rule a true shared
/// grid would need between equal-position precincts of different components.
pub fn sequence(order: ProgressionOrder, num_layers: u16, num_resolutions: u8, num_components: u16, precinct_counts: &[u32]) -> Vec<PacketCoord> {
    let precincts_at = |r: u8| precinct_counts.get(r as usize).copied().unwrap_or(0);
    let max_precincts = precinct_counts.iter().copied().max().unwrap_or(0);
    let mut out = Vec::new();

    match order {
        ProgressionOrder::Lrcp => {
            for layer in 0 .. num_layers {
                for resolution in 0 .. num_resolutions {
                    for component in 0 .. num_components {
                        for precinct in 0 .. precincts_at(resolution) {
                            out.push(PacketCoord { layer, resolution, component, precinct });
                        }
                    }
                }
            }
        },
        ProgressionOrder::Rlcp => {
            for resolution in 0 .. num_resolutions {
                for layer in 0 .. num_layers {
                    for component in 0 .. num_components {
                        for precinct in 0 .. precincts_at(resolution) {
                            out.push(PacketCoord { layer, resolution, component, precinct });
                        }
                    }
                }
            }
        },
        ProgressionOrder::Rpcl => {
            for resolution in 0 .. num_resolutions {
                for precinct in 0 .. precincts_at(resolution) {
                    for component in 0 .. num_components {
                        for layer in 0 .. num_layers {
                            out.push(PacketCoord { layer, resolution, component, precinct });
                        }
                    }
                }
            }
        },
        ProgressionOrder::Pcrl => {
            for precinct in 0 .. max_precincts {
                for component in 0 .. num_components {
                    for resolution in 0 .. num_resolutions {
                        if precinct >= precincts_at(resolution) { continue; }
                        for layer in 0 .. num_layers {
                            out.push(PacketCoord { layer, resolution, component, precinct });
                        }
                    }
                }
            }
        },
        ProgressionOrder::Cprl => {
            for component in 0 .. num_components {
                for precinct in 0 .. max_precincts {
                    for resolution in 0 .. num_resolutions {
                        if precinct >= precincts_at(resolution) { continue; }
                        for layer in 0 .. num_layers {
                            out.push(PacketCoord { layer, resolution, component, precinct });
                        }
                    }
                }
            }
        },
    }

    out
}

/// Splits an already-ordered packet sequence into tile-parts per
/// `division` (spec §4.11), preserving each packet's relative position within
/// its group. The group count always matches
/// [`crate::j2k::tile::Tile::tile_part_count`] for the same `division`, even
/// when a group ends up empty (e.g. a resolution with zero precincts).
pub fn split_into_tile_parts(coords: &[PacketCoord], division: TilePartDivision, num_resolutions: u8, num_components: u16) -> Vec<Vec<PacketCoord>> {
    match division {
        TilePartDivision::None => vec![coords.to_vec()],
        TilePartDivision::Resolutions => {
            (0 .. num_resolutions).map(|r| coords.iter().copied().filter(|c| c.resolution == r).collect()).collect()
        },
        TilePartDivision::Components => {
            (0 .. num_components).map(|c| coords.iter().copied().filter(|p| p.component == c).collect()).collect()
        },
        TilePartDivision::ResolutionsAndComponents => {
            let mut parts = Vec::with_capacity(num_resolutions as usize * num_components.max(1) as usize);
            for r in 0 .. num_resolutions {
                for c in 0 .. num_components {
                    parts.push(coords.iter().copied().filter(|p| p.resolution == r && p.component == c).collect());
                }
            }
            parts
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lrcp_visits_layer_as_the_outermost_axis() {
        let coords = sequence(ProgressionOrder::Lrcp, 2, 3, 2, &[1, 1, 1]);
        let expected_count = 2 * 3 * 2 * 1;
        assert_eq!(coords.len(), expected_count);
        assert!(coords[.. expected_count / 2].iter().all(|c| c.layer == 0));
        assert!(coords[expected_count / 2 ..].iter().all(|c| c.layer == 1));
    }

    #[test]
    fn rlcp_visits_resolution_as_the_outermost_axis() {
        let coords = sequence(ProgressionOrder::Rlcp, 1, 3, 1, &[2, 2, 2]);
        for (expected_resolution, chunk) in coords.chunks(2).enumerate() {
            assert!(chunk.iter().all(|c| c.resolution as usize == expected_resolution));
        }
    }

    #[test]
    fn every_order_visits_the_same_set_of_coordinates() {
        let counts = [3u32, 2, 1];
        let mut sets: Vec<Vec<PacketCoord>> = [ProgressionOrder::Lrcp, ProgressionOrder::Rlcp, ProgressionOrder::Rpcl, ProgressionOrder::Pcrl, ProgressionOrder::Cprl]
            .into_iter()
            .map(|order| {
                let mut coords = sequence(order, 2, 3, 2, &counts);
                coords.sort_by_key(|c| (c.layer, c.resolution, c.component, c.precinct));
                coords
            })
            .collect();

        let reference = sets.pop().unwrap();
        for set in sets {
            assert_eq!(set, reference);
        }
    }

    #[test]
    fn tile_part_split_matches_division_style() {
        let coords = sequence(ProgressionOrder::Rlcp, 1, 4, 3, &[1, 1, 1, 1]);

        assert_eq!(split_into_tile_parts(&coords, TilePartDivision::None, 4, 3).len(), 1);
        assert_eq!(split_into_tile_parts(&coords, TilePartDivision::Resolutions, 4, 3).len(), 4);
        assert_eq!(split_into_tile_parts(&coords, TilePartDivision::Components, 4, 3).len(), 3);
        assert_eq!(split_into_tile_parts(&coords, TilePartDivision::ResolutionsAndComponents, 4, 3).len(), 12);

        let by_resolution = split_into_tile_parts(&coords, TilePartDivision::Resolutions, 4, 3);
        for (resolution, part) in by_resolution.iter().enumerate() {
            assert!(part.iter().all(|c| c.resolution as usize == resolution));
        }
    }
}
