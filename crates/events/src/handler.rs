/// Decide and evolve in one step, with no persistence.
///
/// Used by the aggregate unit tests and by anything that needs the events a
/// command would produce against an in-memory instance. The full pipeline with
/// conditional appends lives in the infrastructure `CommandDispatcher`.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storefront_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
