use tracing::debug;

use crate::error::{Result, TopologyError};
use crate::print::FacePrint;

use super::BuildingSurface;

impl BuildingSurface {
    /// Projects facet `index` onto the ground plane.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the facet has no
    /// supporting plane.
    pub fn project_facet(&self, index: usize) -> Result<FacePrint> {
        let &f = self
            .facets()
            .get(index)
            .ok_or_else(|| TopologyError::EntityNotFound(format!("facet {index}")))?;
        FacePrint::from_points(index, &self.facet_points(f)?)
    }

    /// Projects every facet, skipping those without a supporting plane.
    #[must_use]
    pub fn project_facets(&self) -> Vec<FacePrint> {
        (0..self.num_facets())
            .filter_map(|i| match self.project_facet(i) {
                Ok(print) => Some(print),
                Err(err) => {
                    debug!(building = self.name(), facet = i, error = %err, "facet not projected");
                    None
                }
            })
            .collect()
    }
}
