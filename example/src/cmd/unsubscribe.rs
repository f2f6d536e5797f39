use websub_subscriber::Notifier;

use crate::common::SubscriptionOpt;

#[derive(clap::Args)]
pub struct Opt {
    #[command(flatten)]
    subscription: SubscriptionOpt,
}

pub async fn main(opt: Opt) -> anyhow::Result<()> {
    let client = crate::common::http_client();
    let pool = crate::common::database_pool()?;
    let notifier = Notifier::new(opt.subscription.config()?, client, pool);

    let report = notifier.unsubscribe_all::<hyper::Body>().await?;
    crate::common::print_report(&report);

    Ok(())
}
