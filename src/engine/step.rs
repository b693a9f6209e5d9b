/// Opaque handle to one simulation step.
///
/// A step is produced when a piece is placed. Its reward is only final once
/// the engine has resolved every chain and garbage exchange it triggered, at
/// which point `is_terminal` starts returning `true`. Implementations are
/// expected to be cheap to clone (typically an `Arc` around engine state)
/// and may flip to terminal from another thread.
pub trait Step: Clone + Send + 'static {
    /// Whether the outcome of this step is fully determined.
    fn is_terminal(&self) -> bool;

    /// The successor step, used to bootstrap the next-state value.
    fn next(&self) -> Self;
}

/// The simulator driving the game.
pub trait Simulation {
    type Step: Step;

    /// Snapshot of the step the agent must act on now.
    fn current_step(&self) -> Self::Step;

    /// Apply the selected action (an index into the fixed action space).
    fn apply_action(&mut self, action: usize);
}
