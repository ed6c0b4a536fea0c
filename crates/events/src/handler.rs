/// Decide and evolve in one step, without storage.
///
/// Runs `handle` and then applies every returned event to the aggregate. The
/// dispatcher in the infrastructure crate does the same thing around an event
/// store; this variant is what domain tests and in-process replays use.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: spicecart_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
