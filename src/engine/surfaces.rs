/// One of the two backdrop layers the renderer stacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Primary,
    Alternate,
}

impl Surface {
    pub fn other(self) -> Surface {
        match self {
            Surface::Primary => Surface::Alternate,
            Surface::Alternate => Surface::Primary,
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Surface::Primary => write!(f, "primary"),
            Surface::Alternate => write!(f, "alternate"),
        }
    }
}

/// Double buffer for backdrops: the next image is loaded into `standby`
/// while `active` stays on screen, then the two trade places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfacePair {
    pub active: Surface,
    pub standby: Surface,
}

impl Default for SurfacePair {
    fn default() -> Self {
        Self {
            active: Surface::Alternate,
            standby: Surface::Primary,
        }
    }
}

impl SurfacePair {
    pub fn swap(&mut self) {
        self.active = self.standby;
        self.standby = self.active.other();
    }
}
