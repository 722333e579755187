// Integration test modules, one per engine concern.
mod agentic;
mod cancellation;
mod degradation;
mod fan_out;
mod routing;
