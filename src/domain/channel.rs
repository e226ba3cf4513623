use crate::domain::grid::{direction_between, CellGrid, GridSpec};

/// Trapezoidal geometry and roughness of a single channel node.
///
/// `chanlength` is the along-channel length represented by the node
/// (cell size times sinuosity for straight-through links); `twidth`
/// is the derived top width at the top of bank.
#[derive(Clone, Default)]
pub struct NodeProps {
    pub bwidth: f64,        //bottom width (m)
    pub sideslope: f64,     //side slope z (dimensionless, 1:z)
    pub hbank: f64,         //bank height (m)
    pub nmanning: f64,      //Manning n
    pub sinuosity: f64,     //channel sinuosity (dimensionless)
    pub deadstorage: f64,   //dead storage depth (m)
    pub chanlength: f64,    //channel length through the cell (m)
    pub twidth: f64,        //top width at top of bank (m)
    pub elevbed0: f64,      //initial bed elevation (m)
}

impl NodeProps {
    /// Flow area of the trapezoidal section at depth h, with the
    /// rectangular over-bank contribution above the bank height.
    pub fn flow_area(&self, h: f64) -> f64 {
        if h <= 0.0 {
            0.0
        } else if h <= self.hbank {
            (self.bwidth + self.sideslope * h) * h
        } else {
            (self.bwidth + self.sideslope * self.hbank) * self.hbank
                + (h - self.hbank) * self.twidth
        }
    }

    /// Wetted perimeter at depth h
    pub fn wetted_perimeter(&self, h: f64) -> f64 {
        if h <= 0.0 {
            0.0
        } else if h <= self.hbank {
            self.bwidth + 2.0 * h * (1.0 + self.sideslope * self.sideslope).sqrt()
        } else {
            self.bwidth
                + 2.0 * self.hbank * (1.0 + self.sideslope * self.sideslope).sqrt()
                + 2.0 * (h - self.hbank)
        }
    }

    /// Water volume held by the node at depth h (m3)
    pub fn volume(&self, h: f64) -> f64 {
        self.flow_area(h) * self.chanlength
    }

    /// Volume held when the channel is exactly full to bank (m3)
    pub fn volume_at_bank(&self) -> f64 {
        (self.bwidth + self.sideslope * self.hbank) * self.hbank * self.chanlength
    }

    /// Surface area of the channel portion of the cell (m2)
    pub fn surface_area(&self) -> f64 {
        self.twidth * self.chanlength
    }

    /*
    Depth corresponding to a stored water volume, inverting the
    trapezoidal prism (positive root of the quadratic) with the
    rectangular over-bank section above the bank height.
     */
    pub fn depth_from_volume(&self, v: f64) -> f64 {
        if v <= 0.0 {
            return 0.0;
        }
        let vbank = self.volume_at_bank();
        if v > vbank {
            return self.hbank + (v - vbank) / (self.chanlength * self.twidth);
        }
        let a = v / self.chanlength; //cross-section area at the sought depth
        if self.sideslope > 0.0 {
            (-self.bwidth
                + (self.bwidth * self.bwidth + 4.0 * self.sideslope * a).sqrt())
                / (2.0 * self.sideslope)
        } else {
            //rectangular channel
            a / self.bwidth
        }
    }
}

/// The dendritic channel network: a set of links, each a run of nodes
/// stored flat with a per-link offset table.  Node properties, the
/// node-to-cell map, and the eight-direction branch topology all hang
/// off this struct.
#[derive(Clone, Default)]
pub struct ChannelNetwork {
    pub nlinks: usize,
    offsets: Vec<usize>, //len nlinks+1; nodes of link l live at offsets[l]..offsets[l+1]

    pub props: Vec<NodeProps>,
    pub node_row: Vec<usize>,
    pub node_col: Vec<usize>,

    //Reverse map, defined only on channel cells (usize::MAX elsewhere)
    pub cell_link: CellGrid<usize>,
    pub cell_node: CellGrid<usize>,

    //Branch topology, indexed by compass direction 1..=8.
    //upbranch[l][k] is the link whose last node feeds node 0 of link l
    //from direction k; downbranch[l][k] is the link receiving the
    //outflow of the last node of link l toward direction k.
    pub upbranch: Vec<[Option<usize>; 9]>,
    pub downbranch: Vec<[Option<usize>; 9]>,
}

pub const NO_NODE: usize = usize::MAX;

impl ChannelNetwork {
    pub fn new(spec: &GridSpec, nnodes_per_link: &[usize]) -> ChannelNetwork {
        let nlinks = nnodes_per_link.len();
        let mut offsets = Vec::with_capacity(nlinks + 1);
        let mut total = 0usize;
        offsets.push(0);
        for &n in nnodes_per_link {
            total += n;
            offsets.push(total);
        }
        ChannelNetwork {
            nlinks,
            offsets,
            props: vec![NodeProps::default(); total],
            node_row: vec![0; total],
            node_col: vec![0; total],
            cell_link: CellGrid::filled(spec.nrows, spec.ncols, NO_NODE),
            cell_node: CellGrid::filled(spec.nrows, spec.ncols, NO_NODE),
            upbranch: vec![[None; 9]; nlinks],
            downbranch: vec![[None; 9]; nlinks],
        }
    }

    pub fn total_nodes(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    #[inline]
    pub fn nnodes(&self, link: usize) -> usize {
        self.offsets[link + 1] - self.offsets[link]
    }

    /// Flat index of node `node` (0-based) of link `link`
    #[inline]
    pub fn node_index(&self, link: usize, node: usize) -> usize {
        debug_assert!(node < self.nnodes(link));
        self.offsets[link] + node
    }

    /// Grid cell of a node
    #[inline]
    pub fn node_cell(&self, link: usize, node: usize) -> (usize, usize) {
        let n = self.node_index(link, node);
        (self.node_row[n], self.node_col[n])
    }

    /// Channel (link, node) at a grid cell, if any
    pub fn at_cell(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        let l = self.cell_link.at(row, col);
        if l == NO_NODE {
            None
        } else {
            Some((l, self.cell_node.at(row, col)))
        }
    }

    /// The link downstream of a link, with the compass direction of
    /// the connection, if the link does not end at the boundary.
    pub fn downstream_link(&self, link: usize) -> Option<(usize, usize)> {
        for k in 1..=8 {
            if let Some(d) = self.downbranch[link][k] {
                return Some((d, k));
            }
        }
        None
    }

    /// Links upstream of a link (feeding its first node)
    pub fn upstream_links(&self, link: usize) -> Vec<(usize, usize)> {
        let mut ups = Vec::new();
        for k in 1..=8 {
            if let Some(u) = self.upbranch[link][k] {
                ups.push((u, k));
            }
        }
        ups
    }

    /*
    Populate the cell maps and derive the branch topology from node
    adjacency: a link whose last node sits next to the first node of
    another link drains into it.  Consecutive nodes of a link must
    occupy adjacent cells.
     */
    pub fn connect(&mut self) -> Result<(), String> {
        //Build the reverse (cell -> link/node) maps
        for link in 0..self.nlinks {
            for node in 0..self.nnodes(link) {
                let (row, col) = self.node_cell(link, node);
                self.cell_link.set(row, col, link);
                self.cell_node.set(row, col, node);
            }
        }

        //Check internal adjacency of each link
        for link in 0..self.nlinks {
            for node in 1..self.nnodes(link) {
                let a = self.node_cell(link, node - 1);
                let b = self.node_cell(link, node);
                if direction_between(a, b).is_none() {
                    return Err(format!(
                        "channel network error: link {} nodes {} and {} are not in adjacent cells",
                        link + 1,
                        node,
                        node + 1
                    ));
                }
            }
        }

        //Derive up/down branch tables from the cells around link ends
        for link in 0..self.nlinks {
            let last = self.nnodes(link) - 1;
            let from = self.node_cell(link, last);
            for other in 0..self.nlinks {
                if other == link {
                    continue;
                }
                let to = self.node_cell(other, 0);
                if let Some(k) = direction_between(from, to) {
                    self.downbranch[link][k] = Some(other);
                    //the reciprocal entry points back up the connection
                    self.upbranch[other][crate::domain::grid::opposite(k)] = Some(link);
                }
            }
        }

        //A link may drain to at most one downstream link
        for link in 0..self.nlinks {
            let n = (1..=8).filter(|&k| self.downbranch[link][k].is_some()).count();
            if n > 1 {
                return Err(format!(
                    "channel network error: link {} has {} downstream connections",
                    link + 1,
                    n
                ));
            }
        }

        Ok(())
    }

    /// Compass direction of the node-to-node flow path leaving node
    /// `node` of `link` (toward the next node, the downstream link, or
    /// None at a boundary outlet).
    pub fn outflow_direction(&self, link: usize, node: usize) -> Option<usize> {
        let from = self.node_cell(link, node);
        if node + 1 < self.nnodes(link) {
            direction_between(from, self.node_cell(link, node + 1))
        } else if let Some((dlink, k)) = self.downstream_link(link) {
            let _ = dlink;
            Some(k)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> NodeProps {
        NodeProps {
            bwidth: 2.0,
            sideslope: 1.0,
            hbank: 1.0,
            nmanning: 0.04,
            sinuosity: 1.0,
            deadstorage: 0.0,
            chanlength: 100.0,
            twidth: 4.0,
            elevbed0: 10.0,
        }
    }

    #[test]
    fn trapezoid_area_and_perimeter() {
        let p = props();
        //A = (b + z h) h = (2 + 0.5) * 0.5 = 1.25 at h = 0.5
        assert!((p.flow_area(0.5) - 1.25).abs() < 1e-12);
        //P = b + 2 h sqrt(1 + z^2)
        let wp = 2.0 + 2.0 * 0.5 * (2.0f64).sqrt();
        assert!((p.wetted_perimeter(0.5) - wp).abs() < 1e-12);
    }

    #[test]
    fn over_bank_section_is_rectangular() {
        let p = props();
        let below = p.flow_area(1.0);
        let above = p.flow_area(1.5);
        assert!((above - (below + 0.5 * p.twidth)).abs() < 1e-12);
    }

    #[test]
    fn depth_volume_roundtrip() {
        let p = props();
        for &h in &[0.0, 0.2, 0.6, 1.0, 1.7] {
            let v = p.volume(h);
            let back = p.depth_from_volume(v);
            assert!((back - h).abs() < 1e-9, "h={} back={}", h, back);
        }
    }
}
