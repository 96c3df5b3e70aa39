mod app;
mod config;
mod form;
mod reconcile;
mod reload;
mod rules;
mod session;
mod sheet;
mod usb;

#[cfg(test)]
mod testing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  app::run().await
}
