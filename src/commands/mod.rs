/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes three top-level command modules:

- `run`     -- Orchestrate a test suite against its declared servers
- `serve`   -- Run the reference server with the sample library
- `inspect` -- Ad hoc `methods`/`invoke` diagnostics against any server

These handlers are intentionally small and use the library components:
the orchestrator, the RPC server and client, and the suite model.
*/

pub mod inspect;
pub mod run;
pub mod serve;
