//! Coarse-to-fine refinement of coarse placements.
//!
//! A placement surviving level `l` is doubled and searched again at level
//! `l - 1` inside `[2x - T_f, 2x + 2 T_c]` on both axes, where `T_f` and
//! `T_c` are the spreading factors of the finer and coarser level.

use crate::response::ResponseMaps;
use crate::search::scan::{best_in_window, Placement};
use crate::template::Template;

/// Settles a coarse-grid hit inside its stride cell at the coarsest level.
pub(crate) fn settle_coarse(
    maps: &ResponseMaps,
    templ: &Template,
    hit: Placement,
    stride: usize,
    threshold: f32,
) -> Option<Placement> {
    let reach = stride.max(1) - 1;
    best_in_window(
        maps,
        templ,
        (hit.x, hit.y),
        (hit.x + reach, hit.y + reach),
        threshold,
    )
}

/// Follows a placement found at the coarsest level down to level 0.
///
/// `levels[l]` and `templates[l]` describe pyramid level `l`. Returns the
/// level-0 placement, or `None` once a level falls below `threshold`.
pub(crate) fn refine_to_base(
    levels: &[ResponseMaps],
    templates: &[Template],
    start: Placement,
    threshold: f32,
) -> Option<Placement> {
    let top = levels.len().min(templates.len()).checked_sub(1)?;
    let mut current = start;
    for level in (0..top).rev() {
        let t_fine = levels[level].spread_t();
        let t_coarse = levels[level + 1].spread_t();
        let cx = current.x * 2;
        let cy = current.y * 2;
        current = best_in_window(
            &levels[level],
            &templates[level],
            (cx.saturating_sub(t_fine), cy.saturating_sub(t_fine)),
            (cx + 2 * t_coarse, cy + 2 * t_coarse),
            threshold,
        )?;
    }
    Some(current)
}
