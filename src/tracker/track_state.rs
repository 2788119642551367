/// Lifecycle state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Born from an unmatched detection, identity not yet established.
    #[default]
    Tentative,
    /// Established identity, reported in the per-frame output.
    Confirmed,
    /// Unmatched this frame; retained for revival within the grace window.
    Lost,
    /// Terminal. Evicted from the live set; the id is never reassigned.
    Removed,
}
